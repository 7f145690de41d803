//! Error types for the coordination layer.

use blindfilter_compute::ComputeError;
use blindfilter_ledger::LedgerError;
use blindfilter_types::{ClientId, RequestId};
use thiserror::Error;

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Errors surfaced to clients and backend callbacks.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The client has no finalized match to act on.
    #[error("no processed match for client {0}")]
    NotProcessed(ClientId),

    /// The request id is not (or no longer) live.
    #[error("stale or unknown request: {0}")]
    StaleRequest(RequestId),

    /// The callback's proof did not verify.
    #[error("invalid proof for request {0}")]
    InvalidProof(RequestId),

    /// The proof verified but the result bytes could not be decoded.
    #[error("malformed result for request {request_id}: {reason}")]
    MalformedResult { request_id: RequestId, reason: String },

    /// The rule set exceeds the configured payload limit.
    #[error("match payload of {rules} rules exceeds limit of {limit}")]
    PayloadTooLarge { rules: usize, limit: usize },

    /// Ledger or sync failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Computation backend failure.
    #[error("backend error: {0}")]
    Backend(#[from] ComputeError),
}

/// Coarse classification of a [`CoordinatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotProcessed,
    StaleRequest,
    InvalidProof,
    Unauthorized,
    /// The caller asked for something the protocol does not allow.
    InvalidRequest,
    /// Storage, backend or decoding fault.
    Internal,
}

impl CoordinatorError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotProcessed(_) => ErrorKind::NotProcessed,
            Self::StaleRequest(_) => ErrorKind::StaleRequest,
            Self::InvalidProof(_) => ErrorKind::InvalidProof,
            Self::PayloadTooLarge { .. } => ErrorKind::InvalidRequest,
            Self::MalformedResult { .. } | Self::Backend(_) => ErrorKind::Internal,
            Self::Ledger(err) => match err {
                LedgerError::NotFound(_) => ErrorKind::NotFound,
                LedgerError::Unauthorized(_) => ErrorKind::Unauthorized,
                LedgerError::CursorAhead { .. } => ErrorKind::InvalidRequest,
                LedgerError::IdsExhausted | LedgerError::Storage(_) => ErrorKind::Internal,
            },
        }
    }
}
