//! Reference chat peer.
//!
//! Answers every `{"message", "timestamp"}` frame with exactly one
//! `{"response"}` frame, in order, which is what the client expects.
//!
//! Run:
//!   cargo run -p chatline-demo-echo-server -- --port 8001 --api-key secret
//!   cargo run -p chatline-demo-echo-server -- --port 8001 --delay-ms 500

mod protocol;
mod server;

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "echo-server", about = "Reference chat peer for chatline")]
struct Args {
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Credential every client must send; any is accepted when absent
    #[arg(long, env = "CHATLINE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pause before each reply, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("echo_server=info".parse()?))
        .init();

    let args = Args::parse();
    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();

    tracing::info!("Starting echo server on {}", addr);
    if args.api_key.is_none() {
        tracing::warn!("No --api-key given, accepting any credential");
    }

    let settings = server::Settings {
        api_key: args.api_key,
        delay: Duration::from_millis(args.delay_ms),
    };
    server::run(addr, settings).await
}
