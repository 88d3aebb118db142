//! Protocol modules (inbound envelopes + outbound command frames).
//!
//! Both directions use JSON text frames. Inbound frames are decoded into a
//! closed tagged union keyed by the `type` field, with payloads kept as
//! `RawValue` for lazy parsing by higher layers. Outbound frames carry a
//! correlation `id` (except the initial credential message).
//!
//! All parsers are panic-free: malformed input is reported as
//! `HassLinkError` instead of panicking, keeping the message pump resilient
//! to hostile or truncated traffic.

pub mod command;
pub mod envelope;

pub use command::CommandFrame;
pub use envelope::{decode_envelope, Envelope, MessageKind};
