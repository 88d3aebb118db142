//! Public client handle.
//!
//! `Client::connect` spawns the connection supervisor, waits for the first
//! handshake to settle, and hands back a handle carrying the command
//! correlator, the event facade, and the REST boundary. Dropping the handle
//! cancels the supervisor and releases the socket.

use std::sync::Arc;

use tokio::task::JoinHandle;

use hasslink_core::{HassLinkError, Result};

use crate::config::ClientConfig;
use crate::rest::RestClient;
use crate::session::{Phase, SessionState};
use crate::transport::supervisor;

pub struct Client {
    pub(crate) session: Arc<SessionState>,
    rest: RestClient,
    supervisor: JoinHandle<()>,
    version: Option<String>,
}

impl Client {
    /// Establish a session: connect, authenticate, and start the message
    /// pump. Transient connect failures are retried internally; only a
    /// rejected credential (or a malformed base address) fails this call.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let rest = RestClient::new(&config)?;
        let session = Arc::new(SessionState::new(config));
        let supervisor = tokio::spawn(supervisor::run(Arc::clone(&session)));

        let mut rx = session.phase();
        let phase = match rx.wait_for(|p| !matches!(p, Phase::Connecting)).await {
            Ok(state) => Phase::clone(&state),
            Err(_) => {
                // Supervisor exited before ever reaching a terminal phase.
                supervisor.abort();
                return Err(HassLinkError::ConnectionReset);
            }
        };

        match phase {
            Phase::Ready { version, .. } => Ok(Self {
                session,
                rest,
                supervisor,
                version,
            }),
            Phase::AuthFailed { message } => {
                supervisor.abort();
                Err(HassLinkError::AuthRejected { message })
            }
            Phase::Connecting => Err(HassLinkError::ConnectionReset),
        }
    }

    /// Server version reported during the first successful handshake.
    pub fn server_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// HTTP boundary sharing this session's credential.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Tear the session down. Equivalent to dropping the handle; provided
    /// for explicit shutdown at the end of a scope.
    pub fn close(self) {
        self.supervisor.abort();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
