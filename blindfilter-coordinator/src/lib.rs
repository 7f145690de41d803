//! Matching and decryption coordination for blindfilter.
//!
//! A client submits its encrypted URL; the [`MatchingCoordinator`] sends
//! it, together with the whole encrypted rule set, to a
//! [`ComputationBackend`](blindfilter_compute::ComputationBackend). The
//! backend's callback is accepted only if its proof verifies and its
//! request id is still live for some client. The client can then ask the
//! [`DecryptionCoordinator`] to reveal the block/allow bit, and nothing
//! else, of its processed match.
//!
//! [`FilterService`] bundles these with the rule ledger and sync
//! coordinator behind the client-facing operations.

mod config;
mod decryption;
mod error;
mod matching;
mod service;
mod state;
mod table;

pub use config::CoordinatorConfig;
pub use decryption::{DecryptionCoordinator, PendingDecision};
pub use error::{CoordinatorError, CoordinatorResult, ErrorKind};
pub use matching::MatchingCoordinator;
pub use service::{Delivery, FilterService};
pub use table::{MatchStatus, ProcessedMatch};
