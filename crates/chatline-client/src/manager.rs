//! Connection lifecycle and the background receive loop.
//!
//! Each connection attempt gets its own single-worker Tokio runtime. The
//! transport task and the event dispatcher run there, so inbound frames keep
//! draining while the caller's thread is blocked in [`ConnectionManager::recv_timeout`].
//!
//! Shared with the background thread: the state flag (a `watch` channel) and
//! the inbound queue (an unbounded `mpsc` channel, one producer and one
//! consumer). Nothing else crosses threads.

use crate::ClientError;
use crate::transport::{Transport, TransportCommand, TransportEvent, TransportLink};
use crate::ws::WsTransport;
use chatline_core::{ConnectionConfig, ConnectionState, InboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long `close` waits for the closing handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type StateFlag = Arc<watch::Sender<ConnectionState>>;

/// Owns one duplex connection and its receive loop.
pub struct ConnectionManager<T: Transport = WsTransport> {
    config: ConnectionConfig,
    transport: T,
    state: StateFlag,
    live: Option<Live>,
}

/// Resources of a connection that reached `Connected`.
struct Live {
    runtime: Runtime,
    commands: mpsc::UnboundedSender<TransportCommand>,
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
    dispatcher: JoinHandle<()>,
}

impl ConnectionManager<WsTransport> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, WsTransport)
    }
}

impl<T: Transport> ConnectionManager<T> {
    pub fn with_transport(config: ConnectionConfig, transport: T) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            transport,
            state: Arc::new(state),
            live: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Open the connection and wait for the handshake.
    ///
    /// Blocks for at most `connect_timeout`. On failure the state is back to
    /// `Disconnected` and the background loop has been shut down.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let current = self.status();
        if current != ConnectionState::Disconnected {
            return Err(ClientError::InvalidState(current));
        }
        self.config
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.transport
            .prepare(&self.config)
            .map_err(ClientError::InvalidRequest)?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("chatline-recv")
            .enable_all()
            .build()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(endpoint = %self.config.endpoint, "connecting");

        let link = TransportLink::new(command_rx, event_tx);
        runtime.spawn(self.transport.clone().run(self.config.clone(), link));
        let dispatcher = runtime.spawn(dispatch(event_rx, self.state.clone(), inbound_tx));

        let ceiling = self.config.connect_timeout;
        let mut state_rx = self.state.subscribe();
        let reached = runtime.block_on(async move {
            let waited = timeout(ceiling, state_rx.wait_for(|s| *s != ConnectionState::Connecting)).await;
            match waited {
                Ok(Ok(state)) => Some(*state),
                _ => None,
            }
        });

        let settled = match reached {
            Some(state) => state,
            None => self.abandon_attempt(),
        };

        if settled == ConnectionState::Connected {
            tracing::info!(endpoint = %self.config.endpoint, "connected");
            self.live = Some(Live {
                runtime,
                commands: command_tx,
                inbound: inbound_rx,
                dispatcher,
            });
            return Ok(());
        }

        runtime.shutdown_background();
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::warn!(endpoint = %self.config.endpoint, ?ceiling, "connection failed");
        Err(ClientError::ConnectFailed(ceiling))
    }

    /// Move a timed-out attempt back to `Disconnected`, unless the handshake
    /// won the race. Returns the resulting state.
    fn abandon_attempt(&self) -> ConnectionState {
        let mut settled = ConnectionState::Disconnected;
        self.state.send_if_modified(|s| {
            if *s == ConnectionState::Connecting {
                *s = ConnectionState::Disconnected;
                true
            } else {
                settled = *s;
                false
            }
        });
        settled
    }

    /// Write one text frame. Blocks until the transport reports the write.
    pub fn send(&self, frame: String) -> Result<(), ClientError> {
        let state = self.status();
        let live = match &self.live {
            Some(live) if state.is_connected() => live,
            _ => return Err(ClientError::NotConnected(state)),
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        live.commands
            .send(TransportCommand::Send { frame, ack: ack_tx })
            .map_err(|_| ClientError::SendFailed("receive loop has stopped".into()))?;

        let limit = self.config.send_timeout;
        match live.runtime.block_on(timeout(limit, ack_rx)) {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ClientError::SendFailed(e)),
            Ok(Err(_)) => Err(ClientError::SendFailed("transport dropped the frame".into())),
            Err(_) => Err(ClientError::SendFailed(format!(
                "write not acknowledged within {limit:?}"
            ))),
        }
    }

    /// Take the oldest inbound message, waiting up to `wait` for one.
    pub fn recv_timeout(&mut self, wait: Duration) -> Result<InboundMessage, ClientError> {
        let state = self.status();
        let Some(Live {
            runtime, inbound, ..
        }) = self.live.as_mut()
        else {
            return Err(ClientError::NotConnected(state));
        };

        match runtime.block_on(timeout(wait, inbound.recv())) {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(ClientError::ConnectionClosed),
            Err(_) => Err(ClientError::Timeout(wait)),
        }
    }

    /// Drop everything queued. Returns how many messages were discarded.
    pub fn discard_pending(&mut self) -> usize {
        let Some(live) = self.live.as_mut() else {
            return 0;
        };
        let mut dropped = 0;
        while live.inbound.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Shut the connection down. Idempotent; fine to call before `connect`.
    pub fn close(&mut self) {
        if let Some(Live {
            runtime,
            commands,
            mut dispatcher,
            ..
        }) = self.live.take()
        {
            let _ = commands.send(TransportCommand::Close);
            drop(commands);
            if runtime.block_on(timeout(CLOSE_GRACE, &mut dispatcher)).is_err() {
                tracing::debug!("closing handshake timed out");
            }
            runtime.shutdown_background();
        }

        let previous = self.state.send_replace(ConnectionState::Closed);
        if previous != ConnectionState::Closed {
            tracing::info!(endpoint = %self.config.endpoint, "connection closed by client");
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            let _ = live.commands.send(TransportCommand::Close);
            live.runtime.shutdown_background();
        }
    }
}

/// Receive loop: applies transport events in arrival order.
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    state: StateFlag,
    inbound: mpsc::UnboundedSender<InboundMessage>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Opened => {
                state.send_if_modified(|s| {
                    if *s == ConnectionState::Connecting {
                        *s = ConnectionState::Connected;
                        true
                    } else {
                        false
                    }
                });
            }
            TransportEvent::Frame(text) => match InboundMessage::parse(&text) {
                Ok(message) => {
                    tracing::debug!(len = text.len(), "frame received");
                    let _ = inbound.send(message);
                }
                Err(e) => tracing::warn!("dropping frame: {}", e),
            },
            TransportEvent::Error(e) => tracing::warn!("transport error: {}", e),
            TransportEvent::Closed { code, reason } => {
                tracing::info!(?code, %reason, "transport closed");
                break;
            }
        }
    }

    state.send_if_modified(|s| match *s {
        ConnectionState::Connecting => {
            *s = ConnectionState::Disconnected;
            true
        }
        ConnectionState::Connected => {
            *s = ConnectionState::Closed;
            true
        }
        _ => false,
    });
}
