//! Top-level facade crate for hasslink.
//!
//! Re-exports the core protocol types and the client library so users can
//! depend on a single crate.

pub mod core {
    pub use hasslink_core::*;
}

pub mod client {
    pub use hasslink_client::*;
}

pub use hasslink_client::{Client, EventStream};
pub use hasslink_core::{HassLinkError, Result};
