//! Failures reported to the caller.
//!
//! Every blocking operation returns one of these instead of panicking.
//! Malformed inbound frames are not here: they are logged and dropped.

use chatline_core::ConnectionState;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection not established within {0:?}")]
    ConnectFailed(Duration),
    #[error("cannot connect while {0}")]
    InvalidState(ConnectionState),
    #[error("invalid connection request: {0}")]
    InvalidRequest(String),
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),
    #[error("failed to send message: {0}")]
    SendFailed(String),
    #[error("no response received within {0:?}")]
    Timeout(Duration),
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("failed to start receive loop: {0}")]
    Runtime(#[from] std::io::Error),
}
