//! Error types for the GenHub core.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a backend store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: {0}")]
    Sled(#[from] sled::Error),

    #[error("store transaction: {0}")]
    Transaction(String),

    #[error("record codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sled::transaction::TransactionError<StoreError>> for StoreError {
    fn from(err: sled::transaction::TransactionError<StoreError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

/// Failures talking to the generative text API.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("generative API key is not configured")]
    MissingApiKey,

    #[error("generative API request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generative API {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("generative API response parse: {0}")]
    Parse(String),
}
