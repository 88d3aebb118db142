//! Decode-once codec for the transport layer.
//!
//! Text frames become envelopes; anything that fails to parse is dropped
//! here with a trace log so malformed traffic never reaches (or stalls) the
//! dispatcher. Control frames are handled by the supervisor loop directly.

use tokio_tungstenite::tungstenite::Message;

use hasslink_core::protocol::envelope::{decode_envelope, Envelope};

/// Decode one inbound frame, or `None` if it carries nothing routable.
pub fn decode_frame(msg: &Message) -> Option<Envelope> {
    match msg {
        Message::Text(text) => match decode_envelope(text.as_str()) {
            Ok(env) => Some(env),
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed frame");
                None
            }
        },
        Message::Binary(_) => {
            tracing::trace!("dropping unexpected binary frame");
            None
        }
        _ => None,
    }
}
