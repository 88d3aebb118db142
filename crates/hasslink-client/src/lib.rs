//! hasslink client library entry.
//!
//! This crate wires the connection supervisor, handshake, dispatcher,
//! subscription registry, and request correlator into a cohesive client
//! stack. It is intended to be consumed by the binary (`main.rs`), by the
//! facade crate, and by integration tests.

pub mod client;
pub mod config;
pub mod events;
pub mod registry;
pub mod rest;
pub mod transport;

mod commands;
mod session;

pub use client::Client;
pub use events::EventStream;
pub use hasslink_core::{HassLinkError, Result};
