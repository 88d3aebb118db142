//! Request correlator: outbound commands and their `result` answers.
//!
//! Every command gets the next id in the current epoch and is transmitted
//! only once the session is ready. Awaiting callers subscribe to `result`
//! envelopes through their own private queue, discard results addressed to
//! other in-flight commands, and fail with `ConnectionReset` if the epoch
//! ends before their answer arrives.

use serde_json::value::RawValue;
use serde_json::Value;
use tokio::sync::watch;

use hasslink_core::protocol::command::CommandFrame;
use hasslink_core::protocol::envelope::{Envelope, MessageKind};
use hasslink_core::{HassLinkError, Result};

use crate::client::Client;
use crate::registry::Subscription;
use crate::session::Phase;

impl Client {
    /// Fire-and-forget command send. Blocks until the session is ready,
    /// stamps the next id, transmits, and returns the id for the caller to
    /// correlate separately.
    pub async fn send_command(&self, frame: CommandFrame) -> Result<u64> {
        let (id, _epoch, _rx) = self.send_in_epoch(frame).await?;
        Ok(id)
    }

    /// Send a command and wait for its matching `result`. Returns the raw
    /// result payload on success, the embedded error payload as
    /// [`HassLinkError::CommandFailed`] otherwise.
    pub async fn send_and_await(&self, frame: CommandFrame) -> Result<Option<Box<RawValue>>> {
        // Subscribe before sending so the answer cannot slip past.
        let mut sub = self.session.registry.acquire(&[MessageKind::Result]);
        let (id, epoch, mut rx) = self.send_in_epoch(frame).await?;
        self.await_result(&mut sub, &mut rx, id, epoch).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.send_and_await(CommandFrame::new("ping")).await.map(|_| ())
    }

    pub async fn get_states(&self) -> Result<Option<Box<RawValue>>> {
        self.send_and_await(CommandFrame::new("get_states")).await
    }

    pub async fn get_config(&self) -> Result<Option<Box<RawValue>>> {
        self.send_and_await(CommandFrame::new("get_config")).await
    }

    pub async fn get_services(&self) -> Result<Option<Box<RawValue>>> {
        self.send_and_await(CommandFrame::new("get_services")).await
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Option<Value>,
        target: Option<Value>,
    ) -> Result<Option<Box<RawValue>>> {
        let mut frame = CommandFrame::new("call_service")
            .field("domain", Value::String(domain.to_owned()))
            .field("service", Value::String(service.to_owned()));
        if let Some(data) = service_data {
            frame = frame.field("service_data", data);
        }
        if let Some(target) = target {
            frame = frame.field("target", target);
        }
        self.send_and_await(frame).await
    }

    /// Wait for readiness, stamp and transmit. Returns the id, the epoch it
    /// was assigned in, and the phase receiver used for the wait so callers
    /// can keep watching the same epoch.
    pub(crate) async fn send_in_epoch(
        &self,
        frame: CommandFrame,
    ) -> Result<(u64, u64, watch::Receiver<Phase>)> {
        let mut rx = self.session.phase();
        let epoch = self.session.await_ready(&mut rx).await?;
        let id = self.session.send_command_frame(frame, epoch).await?;
        Ok((id, epoch, rx))
    }

    /// Read the private result queue until the id matches, discarding
    /// results meant for other waiters. Fails when the epoch ends.
    pub(crate) async fn await_result(
        &self,
        sub: &mut Subscription,
        rx: &mut watch::Receiver<Phase>,
        id: u64,
        epoch: u64,
    ) -> Result<Option<Box<RawValue>>> {
        loop {
            tokio::select! {
                env = sub.recv() => {
                    match env {
                        Some(Envelope::Result(res)) if res.id == id => {
                            return if res.success {
                                Ok(res.result)
                            } else {
                                Err(HassLinkError::CommandFailed {
                                    error: res
                                        .error
                                        .map(|raw| raw.get().to_owned())
                                        .unwrap_or_else(|| "unknown error".into()),
                                })
                            };
                        }
                        Some(_) => {}
                        None => return Err(HassLinkError::ConnectionReset),
                    }
                }
                () = self.session.epoch_ended(rx, epoch) => {
                    return Err(HassLinkError::ConnectionReset);
                }
            }
        }
    }
}
