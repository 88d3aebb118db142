//! Per-epoch authentication state machine.
//!
//! Runs before any command traffic is allowed on a new connection:
//! wait for the server challenge, answer with the credential, then settle
//! on accepted or rejected. The machine is sans-IO; the supervisor feeds it
//! envelopes and performs whatever step it asks for.

use hasslink_core::protocol::envelope::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the server's opening challenge.
    AwaitChallenge,
    /// Credential sent, waiting for the final answer.
    CredentialSent,
    Authenticated,
    Rejected,
}

/// What the driver must do after feeding one envelope.
#[derive(Debug)]
pub enum Step {
    /// Transmit the credential frame now.
    SendCredential,
    /// Terminal: session is authenticated.
    Accepted { version: Option<String> },
    /// Terminal: credential refused, the session must not serve requests.
    Rejected { message: Option<String> },
    /// Envelope was not relevant in the current state.
    Ignored,
}

#[derive(Debug, Default)]
pub struct Handshake {
    state: HandshakeState,
}

impl Default for HandshakeState {
    fn default() -> Self {
        HandshakeState::AwaitChallenge
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            HandshakeState::Authenticated | HandshakeState::Rejected
        )
    }

    /// Feed one inbound envelope through the machine.
    pub fn advance(&mut self, env: &Envelope) -> Step {
        match (self.state, env) {
            (HandshakeState::AwaitChallenge, Envelope::AuthRequired(_)) => {
                self.state = HandshakeState::CredentialSent;
                Step::SendCredential
            }
            (HandshakeState::CredentialSent, Envelope::AuthOk(outcome)) => {
                self.state = HandshakeState::Authenticated;
                Step::Accepted {
                    version: outcome.ha_version.clone(),
                }
            }
            (
                HandshakeState::AwaitChallenge | HandshakeState::CredentialSent,
                Envelope::AuthInvalid(outcome),
            ) => {
                self.state = HandshakeState::Rejected;
                Step::Rejected {
                    message: outcome.message.clone(),
                }
            }
            _ => Step::Ignored,
        }
    }
}
