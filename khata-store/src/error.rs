use khata_core::{CounterpartyId, OwnerId};
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type surfaced by account storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account {counterparty} not found for owner {owner}")]
    NotFound {
        owner: OwnerId,
        counterparty: CounterpartyId,
    },
    /// A version-checked save lost a race against a concurrent writer. The
    /// caller should reload the account and redo the whole reconcile step.
    #[error("stale write for account {counterparty}: expected version {expected}, stored {stored}")]
    Stale {
        counterparty: CounterpartyId,
        expected: u64,
        stored: u64,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
