//! Connection parameters supplied by the front-end.

use crate::ApiKey;
use crate::credential::DEFAULT_CREDENTIAL_HEADER;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ceiling on waiting for the open acknowledgment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a turn waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a single frame write may take.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do with replies that arrived while nobody was waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReplies {
    /// Leave them queued; the next turn receives the oldest one.
    #[default]
    Keep,
    /// Drop everything queued before sending a new turn.
    DiscardBeforeSend,
}

/// Where and how to connect. Cloned into each connection attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `ws://` or `wss://` URL.
    pub endpoint: String,
    pub credential: ApiKey,
    #[serde(default = "default_header")]
    pub credential_header: String,
    #[serde(default = "default_connect_timeout", with = "seconds")]
    pub connect_timeout: Duration,
    #[serde(default = "default_reply_timeout", with = "seconds")]
    pub reply_timeout: Duration,
    #[serde(default = "default_send_timeout", with = "seconds")]
    pub send_timeout: Duration,
    #[serde(default)]
    pub stale_replies: StaleReplies,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>, credential: ApiKey) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
            credential_header: default_header(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            stale_replies: StaleReplies::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_credential_header(mut self, header: impl Into<String>) -> Self {
        self.credential_header = header.into();
        self
    }

    pub fn with_stale_replies(mut self, policy: StaleReplies) -> Self {
        self.stale_replies = policy;
        self
    }

    /// Check the endpoint scheme and header name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self
            .endpoint
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::MissingScheme(self.endpoint.clone()))?;
        if scheme != "ws" && scheme != "wss" {
            return Err(ConfigError::UnsupportedScheme(scheme));
        }
        let header_ok = !self.credential_header.is_empty()
            && self
                .credential_header
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"-_!#$%&'*+.^`|~".contains(&b));
        if !header_ok {
            return Err(ConfigError::InvalidHeader(self.credential_header.clone()));
        }
        Ok(())
    }
}

fn default_header() -> String {
    DEFAULT_CREDENTIAL_HEADER.to_string()
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_reply_timeout() -> Duration {
    DEFAULT_REPLY_TIMEOUT
}

fn default_send_timeout() -> Duration {
    DEFAULT_SEND_TIMEOUT
}

/// Invalid connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("endpoint must include a scheme, got: {0}")]
    MissingScheme(String),
    #[error("endpoint scheme must be ws or wss, got: {0}")]
    UnsupportedScheme(String),
    #[error("invalid credential header name: {0:?}")]
    InvalidHeader(String),
}

/// Durations as (fractional) seconds in config files.
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
