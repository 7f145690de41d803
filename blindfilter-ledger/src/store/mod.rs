//! Key-value storage behind the ledger.
//!
//! Logical layout, independent of the backing engine:
//! - a rule table keyed by rule id
//! - a client-sync table keyed by client id
//! - ledger metadata (`rule_count`, `last_update`)
//!
//! All mutation goes through [`RuleLedger`](crate::RuleLedger) and
//! [`SyncCoordinator`](crate::SyncCoordinator). Implementations only need to
//! make each call atomic; ordering between calls is the ledger's job.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreResult;
use blindfilter_types::{ClientId, ClientSyncState, Rule, RuleId, Timestamp};

/// Ledger-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerMeta {
    /// Highest assigned rule id, 0 for an empty ledger.
    pub rule_count: u64,
    /// Time of the most recent rule write.
    pub last_update: Timestamp,
}

/// Storage engine for rules and sync cursors.
pub trait LedgerStore: Send + Sync {
    /// Loads the ledger counters.
    fn load_meta(&self) -> StoreResult<LedgerMeta>;

    /// Inserts a new rule and the counters reflecting it, atomically.
    fn insert_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<()>;

    /// Overwrites an existing rule and the counters, atomically.
    /// Returns false (writing nothing) if the rule does not exist.
    fn replace_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<bool>;

    /// Fetches a single rule.
    fn get_rule(&self, id: RuleId) -> StoreResult<Option<Rule>>;

    /// Returns every rule in ascending id order.
    fn rules(&self) -> StoreResult<Vec<Rule>>;

    /// Returns rules with `changed_at > after`, in ascending id order.
    fn rules_changed_after(&self, after: Timestamp) -> StoreResult<Vec<Rule>>;

    /// Fetches a client's sync cursor, if it has ever acknowledged.
    fn sync_state(&self, client_id: &ClientId) -> StoreResult<Option<ClientSyncState>>;

    /// Upserts a client's sync cursor.
    fn save_sync_state(&self, state: &ClientSyncState) -> StoreResult<()>;
}
