//! The authoritative rule ledger.
//!
//! Rules are append-or-update only. Ids form a dense sequence starting at
//! 1 and `rule_count` always equals the highest assigned id. Every write
//! is stamped by the ledger clock and bumps `last_update_timestamp`.

use crate::error::{LedgerError, LedgerResult};
use crate::policy::MaintainerPolicy;
use crate::store::{LedgerMeta, LedgerStore, MemoryStore};
use blindfilter_types::{Clock, ClientId, LedgerEvent, Rule, RuleFields, RuleId, Timestamp};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Capacity of the notification channel. Slow observers lag rather than
/// block writers.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Rules changed after a cursor, plus the ledger time they are current as of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDelta {
    /// Changed rules in ascending id order.
    pub rules: Vec<Rule>,
    /// The ledger's `last_update_timestamp` when the delta was read.
    pub as_of: Timestamp,
}

/// Shared, maintainer-gated store of encrypted rules.
pub struct RuleLedger {
    store: Arc<dyn LedgerStore>,
    policy: Arc<dyn MaintainerPolicy>,
    clock: Arc<dyn Clock>,
    /// Ledger-wide write lock. Guards `rule_count` and `last_update`.
    meta: RwLock<LedgerMeta>,
    events: broadcast::Sender<LedgerEvent>,
}

impl RuleLedger {
    /// Opens a ledger over `store`, restoring its counters.
    pub fn open(
        store: Arc<dyn LedgerStore>,
        policy: Arc<dyn MaintainerPolicy>,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let meta = store.load_meta()?;
        info!(
            rule_count = meta.rule_count,
            last_update = %meta.last_update,
            "Opened rule ledger"
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            store,
            policy,
            clock,
            meta: RwLock::new(meta),
            events,
        })
    }

    /// Creates an empty ledger backed by a [`MemoryStore`].
    pub fn in_memory(policy: Arc<dyn MaintainerPolicy>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(MemoryStore::new()),
            policy,
            clock,
            meta: RwLock::new(LedgerMeta::default()),
            events,
        }
    }

    /// Subscribes to rule notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Highest assigned rule id (0 when empty).
    pub async fn rule_count(&self) -> u64 {
        self.meta.read().await.rule_count
    }

    /// Time of the most recent write (epoch when empty).
    pub async fn last_update_timestamp(&self) -> Timestamp {
        self.meta.read().await.last_update
    }

    fn authorize(&self, caller: &ClientId) -> LedgerResult<()> {
        if self.policy.is_maintainer(caller) {
            Ok(())
        } else {
            warn!(caller = %caller, "Rejected ledger write from non-maintainer");
            Err(LedgerError::Unauthorized(*caller))
        }
    }

    // Write stamps never repeat or run backwards, even if the clock does.
    fn stamp(&self, meta: &LedgerMeta) -> Timestamp {
        self.clock.now().max(meta.last_update.successor())
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Appends a rule and returns its id.
    pub async fn add_rule(&self, caller: &ClientId, fields: RuleFields) -> LedgerResult<RuleId> {
        self.authorize(caller)?;

        let mut meta = self.meta.write().await;
        let id = meta
            .rule_count
            .checked_add(1)
            .and_then(RuleId::new)
            .ok_or(LedgerError::IdsExhausted)?;
        let at = self.stamp(&meta);
        let rule = Rule {
            id,
            fields,
            changed_at: at,
        };
        let next = LedgerMeta {
            rule_count: id.get(),
            last_update: at,
        };
        self.store.insert_rule(&rule, next)?;
        *meta = next;
        drop(meta);

        debug!(rule_id = %id, at = %at, "Rule added");
        self.publish(LedgerEvent::RuleAdded { id, at });
        Ok(id)
    }

    /// Overwrites the encrypted fields of an existing rule.
    pub async fn update_rule(
        &self,
        caller: &ClientId,
        id: RuleId,
        fields: RuleFields,
    ) -> LedgerResult<()> {
        self.authorize(caller)?;

        let mut meta = self.meta.write().await;
        if id.get() > meta.rule_count {
            return Err(LedgerError::NotFound(id));
        }
        let at = self.stamp(&meta);
        let rule = Rule {
            id,
            fields,
            changed_at: at,
        };
        let next = LedgerMeta {
            rule_count: meta.rule_count,
            last_update: at,
        };
        if !self.store.replace_rule(&rule, next)? {
            return Err(LedgerError::NotFound(id));
        }
        *meta = next;
        drop(meta);

        debug!(rule_id = %id, at = %at, "Rule updated");
        self.publish(LedgerEvent::RuleUpdated { id, at });
        Ok(())
    }

    /// Fetches a single rule.
    pub async fn get_rule(&self, id: RuleId) -> LedgerResult<Rule> {
        let _meta = self.meta.read().await;
        self.store.get_rule(id)?.ok_or(LedgerError::NotFound(id))
    }

    /// Returns every rule in ascending id order. Always a full scan.
    pub async fn all_rules(&self) -> LedgerResult<Vec<Rule>> {
        let _meta = self.meta.read().await;
        Ok(self.store.rules()?)
    }

    /// Reads the rules changed strictly after `after`, together with the
    /// ledger time the read is consistent with.
    pub async fn changed_after(&self, after: Timestamp) -> LedgerResult<RuleDelta> {
        let meta = self.meta.read().await;
        let rules = self.store.rules_changed_after(after)?;
        Ok(RuleDelta {
            rules,
            as_of: meta.last_update,
        })
    }

    pub(crate) fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}
