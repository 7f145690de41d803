//! Error types for the computation layer.

use blindfilter_crypto::CryptoError;
use blindfilter_types::RequestId;
use thiserror::Error;

/// Result type for computation backend operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Errors that can occur talking to a computation backend.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The backend refused or failed to accept a request.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A result payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The backend has no record of the request.
    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),

    /// Sealing or opening a value failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// No queued work to process.
    #[error("no pending jobs")]
    QueueEmpty,
}
