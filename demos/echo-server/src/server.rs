//! Echo server implementation.

use crate::protocol::{Rejection, Reply};
use chatline_core::{DEFAULT_CREDENTIAL_HEADER, OutboundEnvelope};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

pub struct Settings {
    /// Required credential, if any.
    pub api_key: Option<String>,
    /// Pause before each reply.
    pub delay: Duration,
}

pub async fn run(addr: SocketAddr, settings: Settings) -> anyhow::Result<()> {
    let settings = Arc::new(settings);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let settings = settings.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, client_addr, settings).await {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

fn authorize(expected: Option<&str>, req: &Request) -> Result<(), ErrorResponse> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = req
        .headers()
        .get(DEFAULT_CREDENTIAL_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented == Some(expected) {
        return Ok(());
    }
    let mut denied = ErrorResponse::new(Some("invalid api key".to_string()));
    *denied.status_mut() = StatusCode::UNAUTHORIZED;
    Err(denied)
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    settings: Arc<Settings>,
) -> anyhow::Result<()> {
    let expected = settings.api_key.clone();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        authorize(expected.as_deref(), req).map(|()| resp)
    })
    .await?;
    let (mut sink, mut stream) = ws.split();

    tracing::info!("Client connected from {}", addr);

    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
        };

        let Message::Text(text) = msg else {
            continue;
        };

        let reply = match serde_json::from_str::<OutboundEnvelope>(text.as_str()) {
            Ok(envelope) => {
                tracing::debug!("{} says {:?} at {}", addr, envelope.message, envelope.timestamp);
                serde_json::to_string(&Reply::echo(&envelope.message))?
            }
            Err(e) => {
                tracing::warn!("Invalid message: {}", e);
                serde_json::to_string(&Rejection {
                    error: e.to_string(),
                })?
            }
        };

        if !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
        sink.send(Message::Text(reply.into())).await?;
    }

    tracing::info!("Connection closed: {}", addr);
    Ok(())
}
