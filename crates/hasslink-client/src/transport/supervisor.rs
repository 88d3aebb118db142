//! Connection supervisor and message pump.
//!
//! Owns the lifetime of one socket connection at a time: connect, run the
//! handshake, pump frames into the registry fan-out, and on any closure
//! clear readiness and reconnect with bounded exponential backoff. Stops
//! only when the owning scope cancels it — or when the credential is
//! rejected, in which case retrying is pointless.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use hasslink_core::protocol::command::CommandFrame;
use hasslink_core::protocol::envelope::{Envelope, MessageKind};

use crate::config::ReconnectSection;
use crate::registry::Subscription;
use crate::session::{Phase, SessionState, WsStream};
use crate::transport::codec::decode_frame;
use crate::transport::handshake::{Handshake, Step};

struct Backoff {
    delay: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    fn new(cfg: &ReconnectSection) -> Self {
        let initial = Duration::from_millis(cfg.initial_delay_ms);
        Self {
            delay: initial,
            initial,
            max: Duration::from_millis(cfg.max_delay_ms),
        }
    }

    fn reset(&mut self) {
        self.delay = self.initial;
    }

    async fn wait(&mut self) {
        sleep(self.delay).await;
        self.delay = (self.delay * 2).min(self.max);
    }
}

/// Supervisor entry point. Never returns under normal operation.
pub(crate) async fn run(session: Arc<SessionState>) {
    let endpoint = match session.config.ws_endpoint() {
        Ok(url) => url,
        Err(e) => {
            // Malformed base address: nothing to retry.
            tracing::error!(error = %e, "cannot derive socket endpoint");
            return;
        }
    };

    let mut epoch: u64 = 0;
    let mut backoff = Backoff::new(&session.config.reconnect);

    loop {
        let stream = match connect_async(endpoint.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                tracing::debug!(error = %e, "connect attempt failed");
                backoff.wait().await;
                continue;
            }
        };
        backoff.reset();

        epoch += 1;
        session.next_id.store(1, Ordering::Relaxed);
        tracing::debug!(epoch, "socket connected");

        let (sink, stream) = stream.split();
        *session.sink.lock().await = Some(sink);

        // The handshake listener must exist before the first frame is
        // pumped, or the server's challenge could arrive unheard.
        let mut auth_sub = Some(session.registry.acquire(&[
            MessageKind::AuthRequired,
            MessageKind::AuthOk,
            MessageKind::AuthInvalid,
        ]));

        let rejected = pump_epoch(&session, epoch, stream, &mut auth_sub).await;

        *session.sink.lock().await = None;
        drop(auth_sub);
        if rejected {
            return;
        }
        session.set_phase(Phase::Connecting);
        tracing::warn!(epoch, "connection closed, reconnecting");
    }
}

/// Read frames for one epoch while driving the handshake. Returns `true`
/// when the credential was rejected (terminal for the whole supervisor).
async fn pump_epoch(
    session: &Arc<SessionState>,
    epoch: u64,
    mut stream: futures_util::stream::SplitStream<WsStream>,
    auth_sub: &mut Option<Subscription>,
) -> bool {
    let mut handshake = Handshake::new();

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(Message::Ping(payload))) => {
                        let mut sink = session.sink.lock().await;
                        if let Some(s) = sink.as_mut() {
                            let _ = s.send(Message::Pong(payload)).await;
                        }
                    }
                    Some(Ok(msg)) => {
                        if let Some(env) = decode_frame(&msg) {
                            session.registry.publish(&env);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "socket read failed");
                        return false;
                    }
                }
            }
            env = recv_auth(auth_sub) => {
                let Some(env) = env else { continue };
                match drive_handshake(session, epoch, &mut handshake, &env).await {
                    HandshakeProgress::Continue => {}
                    HandshakeProgress::Done => *auth_sub = None,
                    HandshakeProgress::Rejected => {
                        *auth_sub = None;
                        return true;
                    }
                    HandshakeProgress::SendFailed => return false,
                }
            }
        }
    }
}

enum HandshakeProgress {
    Continue,
    Done,
    Rejected,
    SendFailed,
}

async fn drive_handshake(
    session: &Arc<SessionState>,
    epoch: u64,
    handshake: &mut Handshake,
    env: &Envelope,
) -> HandshakeProgress {
    match handshake.advance(env) {
        Step::SendCredential => {
            let frame = CommandFrame::auth(&session.config.token);
            let encoded = match frame.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "credential frame encode failed");
                    return HandshakeProgress::SendFailed;
                }
            };
            if let Err(e) = session.send_raw(encoded).await {
                tracing::debug!(error = %e, "credential send failed");
                return HandshakeProgress::SendFailed;
            }
            HandshakeProgress::Continue
        }
        Step::Accepted { version } => {
            tracing::info!(
                epoch,
                version = version.as_deref().unwrap_or("unknown"),
                "authenticated"
            );
            session.set_phase(Phase::Ready { epoch, version });
            HandshakeProgress::Done
        }
        Step::Rejected { message } => {
            tracing::error!(
                message = message.as_deref().unwrap_or("no reason given"),
                "credential rejected"
            );
            session.set_phase(Phase::AuthFailed { message });
            HandshakeProgress::Rejected
        }
        Step::Ignored => HandshakeProgress::Continue,
    }
}

async fn recv_auth(sub: &mut Option<Subscription>) -> Option<Envelope> {
    match sub.as_mut() {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}
