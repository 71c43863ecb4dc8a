//! Connection settings: TOML file, then environment, then flags.

use anyhow::Context;
use chatline_core::{ApiKey, ConnectionConfig, StaleReplies};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "chatline")]
#[command(author, version, about = "Chat with a WebSocket service", long_about = None)]
pub struct Cli {
    /// WebSocket URL, e.g. wss://your-api-gateway-url/dev
    #[arg(long, env = "CHATLINE_URL")]
    pub url: Option<String>,

    /// API key sent with the connection request
    #[arg(long, env = "CHATLINE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// TOML file with connection settings
    #[arg(short, long, env = "CHATLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for each reply
    #[arg(long)]
    pub reply_timeout: Option<f64>,

    /// Drop replies that arrived while no turn was waiting
    #[arg(long)]
    pub discard_stale: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Optional settings file. Every field may be overridden by a flag.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub credential_header: Option<String>,
    pub connect_timeout: Option<f64>,
    pub reply_timeout: Option<f64>,
    #[serde(default)]
    pub discard_stale: bool,
}

impl FileSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

fn seconds(value: f64, what: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {what}: {value}"))
}

/// Merge file and command line. Returns `None` when no URL or key is known
/// yet, so the user can supply them interactively.
pub fn resolve(cli: &Cli, file: FileSettings) -> anyhow::Result<Option<ConnectionConfig>> {
    let url = cli.url.clone().or(file.url);
    let key = cli.api_key.clone().or(file.api_key);
    let (Some(url), Some(key)) = (url, key) else {
        return Ok(None);
    };

    let mut config = ConnectionConfig::new(url, ApiKey::new(key)?);
    if let Some(header) = file.credential_header {
        config = config.with_credential_header(header);
    }
    if let Some(secs) = file.connect_timeout {
        config = config.with_connect_timeout(seconds(secs, "connect_timeout")?);
    }
    if let Some(secs) = cli.reply_timeout.or(file.reply_timeout) {
        config = config.with_reply_timeout(seconds(secs, "reply_timeout")?);
    }
    if cli.discard_stale || file.discard_stale {
        config = config.with_stale_replies(StaleReplies::DiscardBeforeSend);
    }
    config.validate()?;
    Ok(Some(config))
}
