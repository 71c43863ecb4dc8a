//! Conversation state owned by a front-end.
//!
//! Holds at most one live client and the turn history. Connecting again
//! closes the previous client first.

use crate::ClientError;
use crate::bridge::RequestResponseBridge;
use crate::transport::Transport;
use crate::ws::WsTransport;
use chatline_core::{ChatTurn, ConnectionConfig, ConnectionState};

pub struct ChatSession<T: Transport = WsTransport> {
    transport: T,
    client: Option<RequestResponseBridge<T>>,
    history: Vec<ChatTurn>,
}

impl ChatSession<WsTransport> {
    pub fn new() -> Self {
        Self::with_transport(WsTransport)
    }
}

impl Default for ChatSession<WsTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ChatSession<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            client: None,
            history: Vec::new(),
        }
    }

    /// Replace the current client with a freshly connected one.
    ///
    /// The old client is closed even if the new connection fails.
    pub fn connect(&mut self, config: ConnectionConfig) -> Result<(), ClientError> {
        if let Some(mut old) = self.client.take() {
            tracing::debug!("closing previous connection");
            old.close();
        }
        let mut client = RequestResponseBridge::with_transport(config, self.transport.clone());
        client.connect()?;
        self.client = Some(client);
        Ok(())
    }

    pub fn status(&self) -> ConnectionState {
        self.client
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.status())
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Send a prompt and record the exchange.
    ///
    /// The user turn is recorded once the prompt is accepted for sending; the
    /// assistant turn only when a reply arrives.
    pub fn submit(&mut self, prompt: &str) -> Result<String, ClientError> {
        let status = self.status();
        let client = match self.client.as_mut() {
            Some(client) if status.is_connected() => client,
            _ => return Err(ClientError::NotConnected(status)),
        };

        self.history.push(ChatTurn::user(prompt));
        let reply = client.send_turn(prompt)?;
        self.history.push(ChatTurn::assistant(reply.clone()));
        Ok(reply)
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn disconnect(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
        }
    }
}
