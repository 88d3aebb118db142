//! Inbound envelope (JSON).
//!
//! Decoding is two-phase: a cheap tag probe reads the `type` field, then the
//! matching variant is parsed from the original text. Payload fields
//! (`result`, `error`, `event`) are stored as `RawValue` so the core never
//! interprets application content.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{HassLinkError, Result};

/// Message kinds the core routes on.
///
/// Anything else decodes to [`Envelope::Unknown`] and is dropped by the
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AuthRequired,
    AuthOk,
    AuthInvalid,
    Result,
    Event,
}

/// Tag-string table, one row per recognized kind.
const KIND_TABLE: &[(&str, MessageKind)] = &[
    ("auth_required", MessageKind::AuthRequired),
    ("auth_ok", MessageKind::AuthOk),
    ("auth_invalid", MessageKind::AuthInvalid),
    ("result", MessageKind::Result),
    ("event", MessageKind::Event),
];

impl MessageKind {
    /// Wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::AuthRequired => "auth_required",
            MessageKind::AuthOk => "auth_ok",
            MessageKind::AuthInvalid => "auth_invalid",
            MessageKind::Result => "result",
            MessageKind::Event => "event",
        }
    }

    /// Look up a wire tag. `None` for unrecognized tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        KIND_TABLE
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, k)| *k)
    }
}

/// `auth_required` payload: the server's opening challenge.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequired {
    /// Server version advertised with the challenge.
    pub ha_version: String,
}

/// Terminal handshake answer (`auth_ok` / `auth_invalid`).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthOutcome {
    #[serde(default)]
    pub ha_version: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `result` frame answering a correlated command.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultMessage {
    /// Correlation id of the command this result answers.
    pub id: u64,
    pub success: bool,
    /// Raw result payload (lazy parsing by callers).
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
    /// Raw error payload when `success` is false.
    #[serde(default)]
    pub error: Option<Box<RawValue>>,
}

/// `event` frame delivered to an active event subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    /// Correlation id of the subscribe command that created the subscription.
    pub id: u64,
    /// Raw event payload.
    pub event: Box<RawValue>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum Envelope {
    AuthRequired(AuthRequired),
    AuthOk(AuthOutcome),
    AuthInvalid(AuthOutcome),
    Result(ResultMessage),
    Event(EventMessage),
    /// Parseable frame with a tag the core does not route.
    Unknown { kind: String },
}

impl Envelope {
    /// Routing kind of this envelope. `None` for [`Envelope::Unknown`].
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Envelope::AuthRequired(_) => Some(MessageKind::AuthRequired),
            Envelope::AuthOk(_) => Some(MessageKind::AuthOk),
            Envelope::AuthInvalid(_) => Some(MessageKind::AuthInvalid),
            Envelope::Result(_) => Some(MessageKind::Result),
            Envelope::Event(_) => Some(MessageKind::Event),
            Envelope::Unknown { .. } => None,
        }
    }

    /// Correlation id, for the kinds that carry one.
    pub fn correlation_id(&self) -> Option<u64> {
        match self {
            Envelope::Result(r) => Some(r.id),
            Envelope::Event(e) => Some(e.id),
            _ => None,
        }
    }
}

/// Cheap first pass: only the discriminator.
#[derive(Deserialize)]
struct TagProbe<'a> {
    #[serde(rename = "type", borrow)]
    kind: &'a str,
}

/// Decode one inbound text frame.
///
/// Unrecognized tags yield [`Envelope::Unknown`]; anything that fails to
/// parse (bad JSON, missing `type`, wrong field shapes) is a codec error.
pub fn decode_envelope(text: &str) -> Result<Envelope> {
    let probe: TagProbe = serde_json::from_str(text)
        .map_err(|e| HassLinkError::Codec(format!("invalid frame json: {e}")))?;

    let parse_err =
        |e: serde_json::Error| HassLinkError::Codec(format!("malformed {}: {e}", probe.kind));

    let env = match MessageKind::from_tag(probe.kind) {
        Some(MessageKind::AuthRequired) => {
            Envelope::AuthRequired(serde_json::from_str(text).map_err(parse_err)?)
        }
        Some(MessageKind::AuthOk) => {
            Envelope::AuthOk(serde_json::from_str(text).map_err(parse_err)?)
        }
        Some(MessageKind::AuthInvalid) => {
            Envelope::AuthInvalid(serde_json::from_str(text).map_err(parse_err)?)
        }
        Some(MessageKind::Result) => {
            Envelope::Result(serde_json::from_str(text).map_err(parse_err)?)
        }
        Some(MessageKind::Event) => {
            Envelope::Event(serde_json::from_str(text).map_err(parse_err)?)
        }
        None => {
            tracing::trace!(kind = probe.kind, "unrecognized inbound kind");
            Envelope::Unknown {
                kind: probe.kind.to_owned(),
            }
        }
    };
    Ok(env)
}
