//! Static API credential attached to the connection upgrade request.
//!
//! The key travels as a single header value, so it must be non-empty visible
//! ASCII. It is never printed: `Debug` and `Display` redact it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header the credential is sent under unless configured otherwise.
pub const DEFAULT_CREDENTIAL_HEADER: &str = "x-api-key";

/// An API key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKey(String);

impl ApiKey {
    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        if let Some(pos) = key.bytes().position(|b| !(0x20..0x7f).contains(&b)) {
            return Err(CredentialError::InvalidByte(pos));
        }
        Ok(Self(key))
    }

    /// The raw key, for building the header. Do not log this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl FromStr for ApiKey {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ApiKey {
    type Error = CredentialError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ApiKey> for String {
    fn from(key: ApiKey) -> Self {
        key.0
    }
}

/// Error validating a credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("api key cannot be empty")]
    Empty,
    #[error("api key contains a byte not allowed in a header value at offset {0}")]
    InvalidByte(usize),
}
