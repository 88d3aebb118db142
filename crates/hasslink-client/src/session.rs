//! Shared session state threaded through the client stack.
//!
//! One instance lives for the whole client: the supervisor writes the
//! connection phase and the outbound sink slot, every consumer reads them.
//! The phase watch channel doubles as the readiness signal and the epoch
//! broadcast (one writer, many waiters).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hasslink_core::protocol::command::CommandFrame;
use hasslink_core::{HassLinkError, Result};

use crate::config::ClientConfig;
use crate::registry::SubscriptionRegistry;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;

/// Connection phase broadcast to all waiters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Phase {
    /// No authenticated connection right now (startup or between epochs).
    Connecting,
    /// Handshake finished; commands may flow for this epoch.
    Ready {
        epoch: u64,
        version: Option<String>,
    },
    /// Credential rejected; the session is dead.
    AuthFailed { message: Option<String> },
}

pub(crate) struct SessionState {
    pub config: ClientConfig,
    pub registry: Arc<SubscriptionRegistry>,
    /// Write half of the current epoch's socket. `None` between epochs.
    pub sink: Mutex<Option<WsSink>>,
    /// Next correlation id, reset to 1 at every epoch start.
    pub next_id: AtomicU64,
    phase_tx: watch::Sender<Phase>,
}

impl SessionState {
    pub fn new(config: ClientConfig) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Connecting);
        Self {
            config,
            registry: Arc::new(SubscriptionRegistry::new()),
            sink: Mutex::new(None),
            next_id: AtomicU64::new(1),
            phase_tx,
        }
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase_tx.send_replace(phase);
    }

    /// Whether the given epoch is still the current, ready one.
    pub fn is_current_epoch(&self, epoch: u64) -> bool {
        matches!(&*self.phase_tx.borrow(), Phase::Ready { epoch: e, .. } if *e == epoch)
    }

    /// Block until the session is ready; returns the current epoch.
    /// Fails fast once the handshake has been rejected or the supervisor is
    /// gone.
    pub async fn await_ready(&self, rx: &mut watch::Receiver<Phase>) -> Result<u64> {
        let state = rx
            .wait_for(|p| !matches!(p, Phase::Connecting))
            .await
            .map_err(|_| HassLinkError::ConnectionReset)?;
        match &*state {
            Phase::Ready { epoch, .. } => Ok(*epoch),
            Phase::AuthFailed { message } => Err(HassLinkError::AuthRejected {
                message: message.clone(),
            }),
            Phase::Connecting => Err(HassLinkError::ConnectionReset),
        }
    }

    /// Resolves once `epoch` is no longer the current ready epoch (also when
    /// the supervisor itself goes away).
    pub async fn epoch_ended(&self, rx: &mut watch::Receiver<Phase>, epoch: u64) {
        let _ = rx
            .wait_for(|p| !matches!(p, Phase::Ready { epoch: e, .. } if *e == epoch))
            .await;
    }

    /// Transmit one already-encoded text frame on the current socket.
    /// Used by the supervisor for handshake traffic, which flows before the
    /// epoch is marked ready.
    pub async fn send_raw(&self, text: String) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(s) => s
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| HassLinkError::Transport(format!("socket send failed: {e}"))),
            None => Err(HassLinkError::ConnectionReset),
        }
    }

    /// Stamp and transmit one correlated command, returning the assigned id.
    ///
    /// The epoch check, the id draw, and the send all happen under the sink
    /// lock: a caller that observed a stale readiness signal can neither
    /// consume an id from the new epoch's sequence nor leave a frame on the
    /// new epoch's socket, where its id would collide with a fresh command.
    pub async fn send_command_frame(&self, frame: CommandFrame, epoch: u64) -> Result<u64> {
        let mut sink = self.sink.lock().await;
        if !self.is_current_epoch(epoch) {
            return Err(HassLinkError::ConnectionReset);
        }
        let Some(s) = sink.as_mut() else {
            return Err(HassLinkError::ConnectionReset);
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = frame.with_id(id).encode()?;
        s.send(Message::Text(text.into()))
            .await
            .map_err(|e| HassLinkError::Transport(format!("socket send failed: {e}")))?;
        Ok(id)
    }
}
