//! Error taxonomy shared by the ledger adapter, the store and the ingestion loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenwiseError {
    /// Connectivity, timeout or non-success HTTP status from the RPC endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed or unexpected response shape, or a JSON-RPC error object.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// SQLite / filesystem failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A transaction with this signature is already stored.
    #[error("duplicate transaction signature: {0}")]
    DuplicateKey(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TokenwiseError {
    /// Only network failures are worth retrying without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenwiseError::Network(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, TokenwiseError::DuplicateKey(_))
    }
}

impl From<reqwest::Error> for TokenwiseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TokenwiseError::Protocol(err.to_string())
        } else {
            TokenwiseError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TokenwiseError {
    fn from(err: serde_json::Error) -> Self {
        TokenwiseError::Protocol(err.to_string())
    }
}

impl From<rusqlite::Error> for TokenwiseError {
    fn from(err: rusqlite::Error) -> Self {
        TokenwiseError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for TokenwiseError {
    fn from(err: std::io::Error) -> Self {
        TokenwiseError::Storage(err.to_string())
    }
}

impl From<csv::Error> for TokenwiseError {
    fn from(err: csv::Error) -> Self {
        TokenwiseError::Storage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, TokenwiseError>;
