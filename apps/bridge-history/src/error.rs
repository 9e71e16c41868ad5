use alloy::primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("invalid search: {0}")]
    Validation(String),

    #[error("indexer error: {0}")]
    Indexer(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] alloy::transports::TransportError),

    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("transaction not found: {0}")]
    TxNotFound(B256),
}

impl HistoryError {
    /// Whether a failed indexer call is worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HistoryError::Indexer(_) | HistoryError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
