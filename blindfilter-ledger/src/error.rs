//! Error types for the ledger layer.

use blindfilter_types::{ClientId, RuleId, Timestamp};
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the ledger and the sync coordinator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The rule id was never assigned.
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    /// The caller lacks the maintainer capability.
    #[error("caller {0} is not a maintainer")]
    Unauthorized(ClientId),

    /// An acknowledged cursor lies beyond anything the ledger has written.
    #[error("sync cursor {requested} is ahead of the ledger ({latest})")]
    CursorAhead {
        requested: Timestamp,
        latest: Timestamp,
    },

    /// Every rule id has been assigned.
    #[error("rule id space exhausted")]
    IdsExhausted,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Errors raised by a [`LedgerStore`](crate::LedgerStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Persisted data failed to decode.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// A value cannot be represented by the backing engine.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}
