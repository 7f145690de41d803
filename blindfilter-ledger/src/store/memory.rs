//! In-process store.

use super::{LedgerMeta, LedgerStore};
use crate::error::{StoreError, StoreResult};
use blindfilter_types::{ClientId, ClientSyncState, Rule, RuleId, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    meta: LedgerMeta,
    rules: BTreeMap<RuleId, Rule>,
    sync: HashMap<ClientId, ClientSyncState>,
}

/// Store that keeps everything in memory. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> StoreResult<T> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut tables))
    }
}

impl LedgerStore for MemoryStore {
    fn load_meta(&self) -> StoreResult<LedgerMeta> {
        self.with(|t| t.meta)
    }

    fn insert_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<()> {
        self.with(|t| {
            t.rules.insert(rule.id, rule.clone());
            t.meta = meta;
        })
    }

    fn replace_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<bool> {
        self.with(|t| match t.rules.get_mut(&rule.id) {
            Some(slot) => {
                *slot = rule.clone();
                t.meta = meta;
                true
            }
            None => false,
        })
    }

    fn get_rule(&self, id: RuleId) -> StoreResult<Option<Rule>> {
        self.with(|t| t.rules.get(&id).cloned())
    }

    fn rules(&self) -> StoreResult<Vec<Rule>> {
        self.with(|t| t.rules.values().cloned().collect())
    }

    fn rules_changed_after(&self, after: Timestamp) -> StoreResult<Vec<Rule>> {
        self.with(|t| {
            t.rules
                .values()
                .filter(|r| r.changed_at > after)
                .cloned()
                .collect()
        })
    }

    fn sync_state(&self, client_id: &ClientId) -> StoreResult<Option<ClientSyncState>> {
        self.with(|t| t.sync.get(client_id).copied())
    }

    fn save_sync_state(&self, state: &ClientSyncState) -> StoreResult<()> {
        self.with(|t| {
            t.sync.insert(state.client_id, *state);
        })
    }
}
