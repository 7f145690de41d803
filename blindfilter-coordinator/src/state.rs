//! State shared by the matching and decryption coordinators.
//!
//! The match table is only ever locked for synchronous bookkeeping. Backend
//! submissions run under a per-client lock instead, so one client's slow
//! dispatch never stalls another client's requests or callbacks.
//!
//! A backend may answer before `submit_*` has returned the request id to
//! us. While any dispatch is in flight, a callback whose request id is not
//! yet in the table waits for dispatches to settle and looks again before
//! it is rejected as stale.

use crate::table::MatchTable;
use blindfilter_types::ClientId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard, OwnedMutexGuard};

pub(crate) struct CoordinatorState {
    table: Mutex<MatchTable>,
    client_locks: Mutex<HashMap<ClientId, Arc<Mutex<()>>>>,
    in_flight: AtomicUsize,
    settled: watch::Sender<u64>,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        let (settled, _) = watch::channel(0);
        Self {
            table: Mutex::new(MatchTable::default()),
            client_locks: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            settled,
        }
    }
}

impl CoordinatorState {
    pub async fn table(&self) -> MutexGuard<'_, MatchTable> {
        self.table.lock().await
    }

    /// Serializes request operations for one client.
    pub async fn lock_client(&self, client_id: &ClientId) -> OwnedMutexGuard<()> {
        let lock = self
            .client_locks
            .lock()
            .await
            .entry(*client_id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Marks a backend submission as in flight until the guard drops.
    /// Drop the guard only after the returned request id is recorded.
    pub fn begin_dispatch(&self) -> DispatchGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        DispatchGuard { state: self }
    }

    /// Locks the table and resolves a callback's request id to its client.
    ///
    /// Returns `None` once the id is unknown and no dispatch that could
    /// still register it is in flight.
    pub async fn resolve<F>(&self, lookup: F) -> Option<(ClientId, MutexGuard<'_, MatchTable>)>
    where
        F: Fn(&MatchTable) -> Option<ClientId>,
    {
        let mut settled = self.settled.subscribe();
        loop {
            let table = self.table.lock().await;
            if let Some(client_id) = lookup(&*table) {
                return Some((client_id, table));
            }
            // Registration happens under the table lock, before the
            // dispatch count drops, so this read cannot miss one.
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return None;
            }
            drop(table);
            if settled.changed().await.is_err() {
                return None;
            }
        }
    }
}

pub(crate) struct DispatchGuard<'a> {
    state: &'a CoordinatorState,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.settled.send_modify(|n| *n = n.wrapping_add(1));
    }
}
