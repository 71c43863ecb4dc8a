//! Frames the echo server sends back.

use serde::{Deserialize, Serialize};

/// A normal answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub response: String,
}

/// Sent for frames the server cannot read. Carries no `response` key, so the
/// client shows its fallback text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub error: String,
}

impl Reply {
    pub fn echo(message: &str) -> Self {
        Self {
            response: format!("echo: {message}"),
        }
    }
}
