//! Blocking request/response over the connection manager.
//!
//! The protocol has no request IDs. A turn's reply is whatever message is at
//! the head of the inbound queue when the turn starts waiting, so callers must
//! finish one turn before starting the next.

use crate::ClientError;
use crate::manager::ConnectionManager;
use crate::transport::Transport;
use crate::ws::WsTransport;
use chatline_core::{ConnectionConfig, ConnectionState, OutboundEnvelope, StaleReplies};
use std::time::Duration;

/// The caller-facing client: connect, then one turn at a time.
pub struct RequestResponseBridge<T: Transport = WsTransport> {
    manager: ConnectionManager<T>,
}

/// A bridge over the WebSocket transport.
pub type ChatClient = RequestResponseBridge<WsTransport>;

impl RequestResponseBridge<WsTransport> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::from_manager(ConnectionManager::new(config))
    }
}

impl<T: Transport> RequestResponseBridge<T> {
    pub fn with_transport(config: ConnectionConfig, transport: T) -> Self {
        Self::from_manager(ConnectionManager::with_transport(config, transport))
    }

    pub fn from_manager(manager: ConnectionManager<T>) -> Self {
        Self { manager }
    }

    pub fn connect(&mut self) -> Result<(), ClientError> {
        self.manager.connect()
    }

    pub fn status(&self) -> ConnectionState {
        self.manager.status()
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.manager.config()
    }

    pub fn close(&mut self) {
        self.manager.close();
    }

    /// Send a turn and wait for its reply using the configured reply timeout.
    pub fn send_turn(&mut self, text: &str) -> Result<String, ClientError> {
        let wait = self.manager.config().reply_timeout;
        self.send_turn_timeout(text, wait)
    }

    /// Send a turn and wait up to `wait` for its reply.
    ///
    /// Fails with `SendFailed` without waiting if the message cannot be
    /// written, including when not connected.
    pub fn send_turn_timeout(&mut self, text: &str, wait: Duration) -> Result<String, ClientError> {
        if self.manager.config().stale_replies == StaleReplies::DiscardBeforeSend {
            let dropped = self.manager.discard_pending();
            if dropped > 0 {
                tracing::warn!(dropped, "discarding replies nobody waited for");
            }
        }

        let frame = OutboundEnvelope::new(text)
            .to_json()
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;

        if let Err(e) = self.manager.send(frame) {
            tracing::warn!("failed to send message: {}", e);
            return Err(match e {
                ClientError::SendFailed(_) => e,
                other => ClientError::SendFailed(other.to_string()),
            });
        }

        let reply = self.manager.recv_timeout(wait)?;
        Ok(reply.reply_text())
    }
}
