//! Core type definitions for blindfilter.
//!
//! This crate defines the data model shared by every layer of the
//! encrypted rule protocol:
//! - Client, rule and request identifiers
//! - Opaque ciphertext payloads
//! - Ledger timestamps and injectable clocks
//! - Rules, per-client sync cursors and ledger notifications
//!
//! Nothing in this crate ever sees plaintext rule content.

mod ciphertext;
mod event;
mod ids;
mod rule;
mod timestamp;

pub use ciphertext::Ciphertext;
pub use event::LedgerEvent;
pub use ids::{ClientId, RequestId, RuleId};
pub use rule::{ClientSyncState, Rule, RuleFields};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid rule id: {0}")]
    InvalidRuleId(String),
}
