//! Core types for chatline.
//!
//! This crate holds the wire frames, connection parameters and lifecycle
//! state shared by the client and any front-end. It performs no I/O.

mod config;
mod credential;
mod envelope;
mod turn;

pub use config::{
    ConfigError, ConnectionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REPLY_TIMEOUT,
    DEFAULT_SEND_TIMEOUT, StaleReplies,
};
pub use credential::{ApiKey, CredentialError, DEFAULT_CREDENTIAL_HEADER};
pub use envelope::{FALLBACK_REPLY, InboundError, InboundMessage, OutboundEnvelope};
pub use turn::{ChatTurn, Role};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection; initial state, and the state after a failed attempt.
    #[default]
    Disconnected,
    /// Waiting for the open acknowledgment.
    Connecting,
    /// Frames flow both ways.
    Connected,
    /// Terminal. Reconnecting needs a new client.
    Closed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
