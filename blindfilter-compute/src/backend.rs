//! The computation backend boundary.
//!
//! The backend performs the encrypted rule comparison and later discloses
//! decrypted values. Its callbacks are untrusted input: callers must check
//! every result with [`ComputationBackend::verify_proof`] before acting on
//! it.

use crate::codec::MatchOutcome;
use crate::error::ComputeResult;
use async_trait::async_trait;
use blindfilter_types::{Ciphertext, RequestId};
use std::fmt;

/// Which callback a backend must invoke when a request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSelector {
    /// Deliver to the matching coordinator's result handler.
    MatchResult,
    /// Deliver to the decryption coordinator's result handler.
    DecryptionResult,
}

/// Opaque proof attached to a backend callback.
#[derive(Clone, PartialEq, Eq)]
pub struct Proof(Vec<u8>);

impl Proof {
    /// Wraps raw proof bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Logs only need enough of the proof to correlate it.
impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(4)];
        write!(f, "Proof({}.., {} bytes)", hex::encode(head), self.0.len())
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// A match outcome re-encrypted for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedOutcome {
    pub match_score: Ciphertext,
    pub should_block: Ciphertext,
}

/// An external homomorphic-computation service.
///
/// Submissions return immediately with a request id; results arrive later
/// through the callback named by the selector, carrying that same id.
#[async_trait]
pub trait ComputationBackend: Send + Sync {
    /// Queues an encrypted comparison over `payload`.
    async fn submit_computation(
        &self,
        payload: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId>;

    /// Queues disclosure of `targets`.
    async fn submit_decryption(
        &self,
        targets: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId>;

    /// Checks that `proof` binds `result` to `request_id`. Pure.
    fn verify_proof(&self, request_id: &RequestId, result: &[u8], proof: &Proof) -> bool;

    /// Re-encrypts a verified outcome so only ciphertext is stored.
    fn seal_outcome(&self, outcome: &MatchOutcome) -> ComputeResult<SealedOutcome>;
}
