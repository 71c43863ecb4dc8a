//! Frames exchanged with the chat service.
//!
//! Outbound: one [`OutboundEnvelope`] per user turn.
//! Inbound: any JSON object; the reply text lives under `"response"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text shown when a reply carries no `response` field.
pub const FALLBACK_REPLY: &str = "No response received";

const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A user message as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub message: String,
    /// UTC, ISO-8601 without offset suffix. Microseconds are omitted when zero.
    pub timestamp: String,
}

impl OutboundEnvelope {
    /// Stamp a message with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, Utc::now())
    }

    /// Stamp a message with a given time.
    pub fn at(message: impl Into<String>, when: DateTime<Utc>) -> Self {
        let seconds = when.naive_utc().format(SECONDS_FORMAT);
        let timestamp = match when.timestamp_subsec_micros() {
            0 => seconds.to_string(),
            micros => format!("{seconds}.{micros:06}"),
        };
        Self {
            message: message.into(),
            timestamp,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A decoded frame from the service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InboundMessage(Map<String, Value>);

impl InboundMessage {
    /// Decode a text frame. Anything but a JSON object is malformed.
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        Ok(Self(serde_json::from_str(text)?))
    }

    /// The reply to show the user.
    ///
    /// A missing or `null` `response` yields [`FALLBACK_REPLY`]. Non-string
    /// values are rendered as compact JSON.
    pub fn reply_text(&self) -> String {
        match self.0.get("response") {
            None | Some(Value::Null) => FALLBACK_REPLY.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// A frame that could not be decoded. Logged and dropped by the client.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed inbound frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
