//! Per-client incremental sync over the rule ledger.
//!
//! Sync is pull-based and split in two steps. `diff_since` reads the
//! rules a client is missing without touching its cursor; the client then
//! calls `acknowledge` once it has durably applied them. A client that
//! crashes between the two re-fetches the same delta.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{RuleDelta, RuleLedger};
use blindfilter_types::{ClientId, ClientSyncState, Timestamp};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Computes rule deltas and tracks per-client sync cursors.
pub struct SyncCoordinator {
    ledger: Arc<RuleLedger>,
    /// Serializes cursor read-modify-write cycles.
    cursor_lock: Mutex<()>,
}

impl SyncCoordinator {
    /// Creates a coordinator over `ledger`.
    pub fn new(ledger: Arc<RuleLedger>) -> Self {
        Self {
            ledger,
            cursor_lock: Mutex::new(()),
        }
    }

    /// Returns the ledger this coordinator reads from.
    pub fn ledger(&self) -> &Arc<RuleLedger> {
        &self.ledger
    }

    /// Returns the client's cursor, at the epoch if it never acknowledged.
    pub async fn sync_state(&self, client_id: &ClientId) -> LedgerResult<ClientSyncState> {
        Ok(self
            .ledger
            .store()
            .sync_state(client_id)?
            .unwrap_or_else(|| ClientSyncState::new(*client_id)))
    }

    /// Returns every rule changed after the client's cursor, in ascending
    /// id order. Does not move the cursor.
    pub async fn diff_since(&self, client_id: &ClientId) -> LedgerResult<RuleDelta> {
        let cursor = self.sync_state(client_id).await?.last_synced_at;
        let delta = self.ledger.changed_after(cursor).await?;
        debug!(
            client = %client_id,
            cursor = %cursor,
            as_of = %delta.as_of,
            changed = delta.rules.len(),
            "Computed rule delta"
        );
        Ok(delta)
    }

    /// Records that the client has applied everything up to `as_of`.
    ///
    /// Cursors only move forward; acknowledging an older point is a no-op
    /// and returns false. A cursor beyond the ledger's last write is
    /// rejected.
    pub async fn acknowledge(
        &self,
        client_id: &ClientId,
        as_of: Timestamp,
    ) -> LedgerResult<bool> {
        let latest = self.ledger.last_update_timestamp().await;
        if as_of > latest {
            return Err(LedgerError::CursorAhead {
                requested: as_of,
                latest,
            });
        }

        let _guard = self.cursor_lock.lock().await;
        let mut state = self.sync_state(client_id).await?;
        if !state.advance(as_of) {
            return Ok(false);
        }
        self.ledger.store().save_sync_state(&state)?;
        debug!(client = %client_id, cursor = %as_of, "Sync cursor advanced");
        Ok(true)
    }

    /// Cheap advisory poll: has the ledger changed since the client's cursor?
    pub async fn needs_update(&self, client_id: &ClientId) -> LedgerResult<bool> {
        let cursor = self.sync_state(client_id).await?.last_synced_at;
        Ok(cursor < self.ledger.last_update_timestamp().await)
    }
}
