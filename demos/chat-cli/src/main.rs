//! Terminal chat front-end.
//!
//! Plays the part of the UI: collects connection settings, connects on
//! request, and renders one reply (or error) per submitted line.
//!
//! Run against the echo server:
//!   cargo run -p chatline-demo-echo-server -- --api-key secret
//!   cargo run -p chatline-demo-chat-cli -- --url ws://127.0.0.1:8001 --api-key secret

mod settings;

use chatline_client::{ChatSession, ClientError};
use chatline_core::{ApiKey, ConnectionConfig, Role};
use clap::Parser;
use settings::{Cli, FileSettings};
use std::io::{BufRead, Write};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  /connect [url] [api-key]  connect (or reconnect)
  /status                   show connection status
  /history                  show the conversation
  /clear                    forget the conversation
  /quit                     exit
anything else is sent as a message";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "chatline=debug" } else { "chatline=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let file = match &cli.config {
        Some(path) => FileSettings::load(path)?,
        None => FileSettings::default(),
    };
    let mut config = settings::resolve(&cli, file)?;
    let mut session = ChatSession::new();

    println!("chatline {}  (/help for commands)", env!("CARGO_PKG_VERSION"));
    if let Some(cfg) = &config {
        connect(&mut session, cfg.clone());
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/quit"] | ["/exit"] => break,
            ["/help"] => println!("{HELP}"),
            ["/status"] => println!("Status: {}", status_label(&session)),
            ["/history"] => {
                for turn in session.history() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    println!("{who}: {}", turn.content);
                }
            }
            ["/clear"] => session.clear_history(),
            ["/connect", rest @ ..] => {
                match reconfigure(config.clone(), rest) {
                    Ok(Some(cfg)) => {
                        connect(&mut session, cfg.clone());
                        config = Some(cfg);
                    }
                    Ok(None) => println!("usage: /connect <url> <api-key>"),
                    Err(e) => println!("error: {e}"),
                }
            }
            _ => turn(&mut session, line),
        }
    }

    session.disconnect();
    Ok(())
}

fn status_label(session: &ChatSession) -> String {
    if session.is_connected() {
        "Connected".to_string()
    } else {
        format!("Disconnected ({})", session.status())
    }
}

/// Apply `/connect` arguments on top of the current settings.
fn reconfigure(
    current: Option<ConnectionConfig>,
    args: &[&str],
) -> anyhow::Result<Option<ConnectionConfig>> {
    let config = match (current, args) {
        (Some(cfg), []) => cfg,
        (Some(cfg), [url]) => ConnectionConfig {
            endpoint: url.to_string(),
            ..cfg
        },
        (current, [url, key]) => {
            let credential: ApiKey = key.parse()?;
            match current {
                Some(cfg) => ConnectionConfig {
                    endpoint: url.to_string(),
                    credential,
                    ..cfg
                },
                None => ConnectionConfig::new(*url, credential),
            }
        }
        _ => return Ok(None),
    };
    config.validate()?;
    Ok(Some(config))
}

fn connect(session: &mut ChatSession, config: ConnectionConfig) {
    println!("Connecting to {}...", config.endpoint);
    let endpoint = config.endpoint.clone();
    match session.connect(config) {
        Ok(()) => {
            tracing::info!(%endpoint, "session connected");
            println!("Connected!");
        }
        Err(e) => {
            tracing::warn!(%endpoint, "connect failed: {}", e);
            println!("Connection failed! ({e})");
        }
    }
}

fn turn(session: &mut ChatSession, prompt: &str) {
    let result = session.submit(prompt);
    if let Err(e) = &result {
        tracing::warn!("turn failed: {}", e);
    }
    match result {
        Ok(reply) => println!("assistant: {reply}"),
        Err(ClientError::NotConnected(_)) => {
            println!("Please connect to the server first! (/connect <url> <api-key>)")
        }
        Err(ClientError::Timeout(_) | ClientError::ConnectionClosed) => {
            println!("No response received")
        }
        Err(ClientError::SendFailed(reason)) => println!("Failed to send message ({reason})"),
        Err(e) => println!("error: {e}"),
    }
}
