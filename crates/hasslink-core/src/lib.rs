//! hasslink core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire-level contracts shared by the client runtime
//! and by tooling: the inbound envelope codec, the outbound command frame,
//! and the error surface. It intentionally carries no transport or runtime
//! dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `HassLinkError`/`Result` so consumers
//! do not crash on malformed server traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{HassLinkError, Result};
