//! WebSocket transport over `tokio-tungstenite`.

use crate::transport::{Transport, TransportCommand, TransportEvent, TransportLink};
use chatline_core::ConnectionConfig;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

/// Connects with `tokio-tungstenite`, sending the credential as a header.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn prepare(&self, config: &ConnectionConfig) -> Result<(), String> {
        build_request(config).map(drop)
    }

    fn run(
        self,
        config: ConnectionConfig,
        link: TransportLink,
    ) -> impl Future<Output = ()> + Send + 'static {
        run_socket(config, link)
    }
}

/// Build the upgrade request with the credential header attached.
pub fn build_request(config: &ConnectionConfig) -> Result<Request, String> {
    let mut request = config
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| format!("bad endpoint {}: {e}", config.endpoint))?;
    let name = HeaderName::from_bytes(config.credential_header.as_bytes())
        .map_err(|e| format!("bad header name: {e}"))?;
    let mut value = HeaderValue::from_str(config.credential.expose())
        .map_err(|e| format!("bad credential: {e}"))?;
    value.set_sensitive(true);
    request.headers_mut().insert(name, value);
    Ok(request)
}

async fn run_socket(config: ConnectionConfig, mut link: TransportLink) {
    let request = match build_request(&config) {
        Ok(r) => r,
        Err(e) => return link.fail(e),
    };

    let ws = match connect_async(request).await {
        Ok((ws, _response)) => ws,
        Err(e) => return link.fail(format!("connect to {}: {e}", config.endpoint)),
    };
    link.emit(TransportEvent::Opened);

    let (mut sink, mut stream) = ws.split();
    let mut closing = false;
    let mut close_info: (Option<u16>, String) = (None, String::new());

    loop {
        tokio::select! {
            cmd = link.commands.recv(), if !closing => {
                match cmd {
                    Some(TransportCommand::Send { frame, ack }) => {
                        let result = sink
                            .send(Message::Text(frame.into()))
                            .await
                            .map_err(|e| e.to_string());
                        let _ = ack.send(result);
                    }
                    Some(TransportCommand::Close) | None => {
                        closing = true;
                        tracing::debug!("sending close frame");
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            tracing::debug!("close frame not sent: {}", e);
                            break;
                        }
                    }
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        link.emit(TransportEvent::Frame(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            link.emit(TransportEvent::Frame(text));
                        }
                        Err(_) => {
                            link.emit(TransportEvent::Error("binary frame is not UTF-8".into()));
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            close_info = (Some(u16::from(frame.code)), frame.reason.as_str().to_owned());
                        }
                        // Keep polling so tungstenite can flush the close reply.
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        link.emit(TransportEvent::Error(e.to_string()));
                        if close_info.1.is_empty() {
                            close_info.1 = e.to_string();
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let (code, reason) = close_info;
    link.emit(TransportEvent::Closed { code, reason });
}
