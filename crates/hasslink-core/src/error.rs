//! Shared error type across hasslink crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, HassLinkError>;

/// Unified error type used by the core codec and the client runtime.
#[derive(Debug, Error)]
pub enum HassLinkError {
    /// The configured base address cannot be turned into a socket endpoint.
    /// Fatal: retrying cannot fix a malformed address.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Config failed to parse or validate.
    #[error("invalid config: {0}")]
    Config(String),

    /// A frame could not be encoded or decoded.
    #[error("frame codec: {0}")]
    Codec(String),

    /// Socket-level failure (connect, read, write).
    #[error("transport: {0}")]
    Transport(String),

    /// The server rejected the credential during the handshake.
    #[error("authentication rejected: {}", .message.as_deref().unwrap_or("no reason given"))]
    AuthRejected {
        /// Reason reported by the server, if any.
        message: Option<String>,
    },

    /// The server answered a command with `success: false`.
    #[error("command failed: {error}")]
    CommandFailed {
        /// Raw error payload embedded in the result frame.
        error: String,
    },

    /// The connection epoch ended while a caller was still waiting on it.
    #[error("connection reset")]
    ConnectionReset,

    /// HTTP boundary failure.
    #[error("rest request failed: {0}")]
    Rest(String),
}

impl HassLinkError {
    /// Whether this error can be cleared by reconnecting and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HassLinkError::Transport(_) | HassLinkError::ConnectionReset
        )
    }
}
