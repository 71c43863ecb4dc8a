//! The seam between the connection manager and the socket.
//!
//! A transport runs as one task on the connection's background runtime. It
//! reports lifecycle and inbound frames as [`TransportEvent`]s on a single
//! ordered channel and executes [`TransportCommand`]s from the manager.

use chatline_core::ConnectionConfig;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// Something that happened on the wire, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// A text frame from the peer.
    Frame(String),
    /// Non-fatal problem; the transport keeps going unless it also sends `Closed`.
    Error(String),
    /// No further events will follow.
    Closed { code: Option<u16>, reason: String },
}

/// Work requested by the manager.
#[derive(Debug)]
pub enum TransportCommand {
    /// Write one text frame and report the outcome.
    Send {
        frame: String,
        ack: oneshot::Sender<Result<(), String>>,
    },
    /// Start the closing handshake.
    Close,
}

/// Channel ends handed to a running transport.
#[derive(Debug)]
pub struct TransportLink {
    pub commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    pub fn new(
        commands: mpsc::UnboundedReceiver<TransportCommand>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Report an event. Returns false once nobody is listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Report a fatal error followed by the final `Closed`.
    pub fn fail(&self, error: impl Into<String>) {
        let reason = error.into();
        self.emit(TransportEvent::Error(reason.clone()));
        self.emit(TransportEvent::Closed { code: None, reason });
    }
}

/// A duplex text transport.
///
/// `run` is called once per connection attempt with a fresh link and must
/// end with a `Closed` event (or by dropping the link).
pub trait Transport: Clone + Send + Sync + 'static {
    /// Reject a config this transport cannot use, before any attempt starts.
    fn prepare(&self, _config: &ConnectionConfig) -> Result<(), String> {
        Ok(())
    }

    fn run(
        self,
        config: ConnectionConfig,
        link: TransportLink,
    ) -> impl Future<Output = ()> + Send + 'static;
}
