//! Notifications emitted by the rule ledger.

use crate::{RuleId, Timestamp};
use serde::{Deserialize, Serialize};

/// A ledger write, published to observers such as telemetry.
///
/// Sync is pull-based; clients never depend on receiving these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    RuleAdded { id: RuleId, at: Timestamp },
    RuleUpdated { id: RuleId, at: Timestamp },
}

impl LedgerEvent {
    /// The rule the event refers to.
    pub fn rule_id(&self) -> RuleId {
        match self {
            Self::RuleAdded { id, .. } | Self::RuleUpdated { id, .. } => *id,
        }
    }

    /// The ledger timestamp of the write.
    pub fn at(&self) -> Timestamp {
        match self {
            Self::RuleAdded { at, .. } | Self::RuleUpdated { at, .. } => *at,
        }
    }
}
