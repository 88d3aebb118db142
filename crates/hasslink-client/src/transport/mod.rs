//! Transport layer (WebSocket client side).
//!
//! Exposes the connection supervisor that owns the socket lifecycle, the
//! per-epoch handshake state machine, and the codec that decodes frames
//! once before they reach the dispatcher fan-out.

pub mod codec;
pub mod handshake;
pub mod supervisor;
