//! Computation backend boundary for blindfilter.
//!
//! The homomorphic comparison and the later disclosure of its result are
//! performed by an external service, modelled here as the
//! [`ComputationBackend`] trait. This crate also defines the result wire
//! format and ships [`LocalBackend`], an in-process reference backend used
//! by tests and local simulations.

mod backend;
mod codec;
mod error;
pub mod evaluator;
mod local;

pub use backend::{CallbackSelector, ComputationBackend, Proof, SealedOutcome};
pub use codec::{Decision, MatchOutcome, DECISION_RESULT_LEN, MATCH_RESULT_LEN, MIN_MATCH_SCORE};
pub use error::{ComputeError, ComputeResult};
pub use evaluator::{PlainRule, RuleKind};
pub use local::{Completion, LocalBackend};
