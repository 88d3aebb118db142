//! Event stream facade.
//!
//! `subscribe_events` registers interest server-side and yields the raw
//! payload of every `event` envelope whose correlation id matches the
//! subscription. Ids reset on reconnect, so the stream never crosses its
//! epoch: it ends when the connection that created it does. Ending the
//! stream sends a best-effort `unsubscribe_events` referencing the
//! subscription id.

use std::sync::Arc;

use serde_json::value::RawValue;
use serde_json::Value;
use tokio::sync::watch;

use hasslink_core::protocol::command::CommandFrame;
use hasslink_core::protocol::envelope::{Envelope, MessageKind};
use hasslink_core::Result;

use crate::client::Client;
use crate::registry::Subscription;
use crate::session::{Phase, SessionState};

impl Client {
    /// Subscribe to server events, optionally narrowed to one event type.
    ///
    /// Fails with [`hasslink_core::HassLinkError::CommandFailed`] when the
    /// server refuses the subscription.
    pub async fn subscribe_events(&self, event_type: Option<&str>) -> Result<EventStream> {
        // Acquire the event queue before transmitting, so no event emitted
        // between the server's result and our registration can be lost.
        let sub = self.session.registry.acquire(&[MessageKind::Event]);
        let mut result_sub = self.session.registry.acquire(&[MessageKind::Result]);

        let mut frame = CommandFrame::new("subscribe_events");
        if let Some(t) = event_type {
            frame = frame.field("event_type", Value::String(t.to_owned()));
        }
        let (id, epoch, mut rx) = self.send_in_epoch(frame).await?;
        self.await_result(&mut result_sub, &mut rx, id, epoch).await?;

        tracing::debug!(subscription = id, "event subscription established");
        Ok(EventStream {
            subscription_id: id,
            epoch,
            sub,
            rx,
            session: Arc::clone(&self.session),
            closed: false,
        })
    }
}

/// Unbounded, non-restartable sequence of event payloads.
pub struct EventStream {
    subscription_id: u64,
    epoch: u64,
    sub: Subscription,
    rx: watch::Receiver<Phase>,
    session: Arc<SessionState>,
    closed: bool,
}

impl EventStream {
    /// Correlation id the server assigned to this subscription.
    pub fn subscription_id(&self) -> u64 {
        self.subscription_id
    }

    /// Next matching event payload. `None` once the stream's epoch has
    /// ended; events belonging to other subscriptions are filtered out by
    /// id.
    pub async fn next(&mut self) -> Option<Box<RawValue>> {
        if self.closed {
            return None;
        }
        loop {
            tokio::select! {
                env = self.sub.recv() => {
                    match env {
                        Some(Envelope::Event(ev)) if ev.id == self.subscription_id => {
                            return Some(ev.event);
                        }
                        Some(_) => {}
                        None => {
                            self.closed = true;
                            return None;
                        }
                    }
                }
                () = self.session.epoch_ended(&mut self.rx, self.epoch) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// End the stream and tell the server to stop sending. Cleanup is
    /// best-effort: a connection that is already gone is not an error.
    pub async fn close(mut self) {
        self.closed = true;
        unsubscribe(&self.session, self.epoch, self.subscription_id).await;
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Dropped mid-iteration: fire the unsubscribe from a task since
        // Drop cannot await. Outside a runtime there is no connection to
        // clean up either, so skipping is fine.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let session = Arc::clone(&self.session);
        let epoch = self.epoch;
        let id = self.subscription_id;
        handle.spawn(async move {
            unsubscribe(&session, epoch, id).await;
        });
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("subscription_id", &self.subscription_id)
            .field("epoch", &self.epoch)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn unsubscribe(session: &SessionState, epoch: u64, subscription_id: u64) {
    // If the epoch already died, the server-side subscription died with it.
    let frame =
        CommandFrame::new("unsubscribe_events").field("subscription", Value::from(subscription_id));
    if let Err(e) = session.send_command_frame(frame, epoch).await {
        tracing::debug!(error = %e, subscription = subscription_id, "unsubscribe skipped");
    }
}
