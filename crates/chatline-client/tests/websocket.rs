//! End-to-end tests against a real WebSocket server on localhost.
//!
//! The server runs on its own thread and runtime; the client under test is
//! driven synchronously from the test thread.

use chatline_client::{ChatClient, ChatSession, ClientError};
use chatline_core::{ApiKey, ConnectionConfig, ConnectionState, OutboundEnvelope};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::mpsc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

const KEY: &str = "integration-key";

/// Start a server that checks the key and echoes each message back.
///
/// Special messages: `"close"` makes the server close the connection;
/// `"garbage"` sends a malformed frame before the reply. Returns the URL and
/// a channel carrying the credential header seen by each handshake.
fn spawn_server() -> (String, mpsc::Receiver<Option<String>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let url = format!("ws://{}/chat", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = TcpListener::from_std(listener).unwrap();
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let seen_tx = seen_tx.clone();
                tokio::spawn(async move {
                    let check = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        let key = req
                            .headers()
                            .get("x-api-key")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);
                        let ok = key.as_deref() == Some(KEY);
                        let _ = seen_tx.send(key);
                        if ok {
                            Ok(resp)
                        } else {
                            let mut denied = ErrorResponse::new(Some("bad api key".into()));
                            *denied.status_mut() = StatusCode::UNAUTHORIZED;
                            Err(denied)
                        }
                    };
                    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, check).await else {
                        return;
                    };
                    let (mut sink, mut stream) = ws.split();
                    while let Some(Ok(msg)) = stream.next().await {
                        let Message::Text(text) = msg else { continue };
                        let envelope: OutboundEnvelope = serde_json::from_str(text.as_str()).unwrap();
                        match envelope.message.as_str() {
                            "close" => {
                                let _ = sink.send(Message::Close(None)).await;
                            }
                            "garbage" => {
                                let _ = sink.send(Message::Text(String::from("{not json").into())).await;
                                let reply = json!({ "response": "after garbage" }).to_string();
                                let _ = sink.send(Message::Text(reply.into())).await;
                            }
                            other => {
                                let reply = json!({ "response": format!("echo: {other}") }).to_string();
                                let _ = sink.send(Message::Text(reply.into())).await;
                            }
                        }
                    }
                });
            }
        });
    });

    (url, seen_rx)
}

fn config(url: &str, key: &str) -> ConnectionConfig {
    ConnectionConfig::new(url, ApiKey::new(key).unwrap())
        .with_connect_timeout(Duration::from_secs(3))
        .with_reply_timeout(Duration::from_secs(3))
}

#[test]
fn round_trip_with_credential_header() {
    let (url, seen) = spawn_server();
    let mut client = ChatClient::new(config(&url, KEY));
    client.connect().unwrap();
    assert_eq!(client.status(), ConnectionState::Connected);
    assert_eq!(seen.recv_timeout(Duration::from_secs(1)).unwrap().as_deref(), Some(KEY));

    assert_eq!(client.send_turn("hello").unwrap(), "echo: hello");
    assert_eq!(client.send_turn("bye").unwrap(), "echo: bye");
    client.close();
    client.close();
    assert_eq!(client.status(), ConnectionState::Closed);
}

#[test]
fn wrong_key_is_rejected_before_ceiling() {
    let (url, _seen) = spawn_server();
    let mut client = ChatClient::new(config(&url, "wrong"));
    let started = std::time::Instant::now();
    assert!(matches!(client.connect(), Err(ClientError::ConnectFailed(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(client.status(), ConnectionState::Disconnected);
}

#[test]
fn nothing_listening_fails() {
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let mut client = ChatClient::new(config(&format!("ws://127.0.0.1:{port}"), KEY));
    assert!(client.connect().is_err());
    assert_eq!(client.status(), ConnectionState::Disconnected);
}

#[test]
fn malformed_frame_is_skipped() {
    let (url, _seen) = spawn_server();
    let mut client = ChatClient::new(config(&url, KEY));
    client.connect().unwrap();
    assert_eq!(client.send_turn("garbage").unwrap(), "after garbage");
}

#[test]
fn server_close_ends_the_session() {
    let (url, _seen) = spawn_server();
    let mut client = ChatClient::new(config(&url, KEY));
    client.connect().unwrap();

    assert!(matches!(client.send_turn("close"), Err(ClientError::ConnectionClosed)));
    assert_eq!(client.status(), ConnectionState::Closed);
    assert!(matches!(client.send_turn("hello"), Err(ClientError::SendFailed(_))));
}

#[test]
fn session_over_real_socket() {
    let (url, _seen) = spawn_server();
    let mut session = ChatSession::new();
    session.connect(config(&url, KEY)).unwrap();
    assert_eq!(session.submit("one").unwrap(), "echo: one");
    session.connect(config(&url, KEY)).unwrap();
    assert_eq!(session.submit("two").unwrap(), "echo: two");
    assert_eq!(session.history().len(), 4);
    session.disconnect();
}
