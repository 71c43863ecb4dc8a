//! Blocking chat client over a persistent WebSocket.
//!
//! [`ConnectionManager`] owns the socket and a background receive loop;
//! [`RequestResponseBridge`] turns it into one blocking call per chat turn;
//! [`ChatSession`] keeps the history a front-end needs.
//!
//! The API is synchronous and must not be called from inside a Tokio runtime.
//!
//! ```no_run
//! use chatline_client::ChatClient;
//! use chatline_core::{ApiKey, ConnectionConfig};
//!
//! let config = ConnectionConfig::new("ws://localhost:8001", ApiKey::new("key")?);
//! let mut client = ChatClient::new(config);
//! client.connect()?;
//! println!("{}", client.send_turn("hello")?);
//! client.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bridge;
mod error;
mod manager;
mod session;
mod transport;
mod ws;

#[cfg(test)]
mod testutil;

pub use bridge::{ChatClient, RequestResponseBridge};
pub use error::ClientError;
pub use manager::ConnectionManager;
pub use session::ChatSession;
pub use transport::{Transport, TransportCommand, TransportEvent, TransportLink};
pub use ws::{WsTransport, build_request};
