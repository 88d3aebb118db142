//! Outbound command frame (JSON).
//!
//! Wire shape: `{"id": <u64>, "type": <string>, ...fields}`. The id is
//! assigned by the correlator just before transmission; the one frame sent
//! without an id is the initial `auth` credential.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{HassLinkError, Result};

/// One outbound command, built incrementally and encoded once.
#[derive(Debug, Clone, Serialize)]
pub struct CommandFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl CommandFrame {
    /// New frame of the given command type, no id yet.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// The credential frame. Sent before the correlator exists, so it never
    /// carries an id.
    pub fn auth(access_token: &str) -> Self {
        Self::new("auth").field("access_token", Value::String(access_token.to_owned()))
    }

    /// Attach a command-specific field.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Stamp the correlation id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Command type of this frame.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Encode to the wire text format.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| HassLinkError::Codec(format!("encode {} failed: {e}", self.kind)))
    }
}
