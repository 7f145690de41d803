//! Encrypted rule ledger and incremental sync for blindfilter.
//!
//! # Components
//!
//! - **RuleLedger**: authoritative append/update store of encrypted rules,
//!   gated by a [`MaintainerPolicy`]
//! - **SyncCoordinator**: per-client rule deltas and forward-only cursors
//! - **LedgerStore**: the key-value layer underneath, in memory or SQLite
//!
//! # Example
//!
//! ```
//! use blindfilter_ledger::{MaintainerSet, RuleLedger, SyncCoordinator};
//! use blindfilter_types::{ClientId, SystemClock};
//! use std::sync::Arc;
//!
//! let maintainer = ClientId::new();
//! let ledger = Arc::new(RuleLedger::in_memory(
//!     Arc::new(MaintainerSet::single(maintainer)),
//!     Arc::new(SystemClock),
//! ));
//! let sync = SyncCoordinator::new(ledger.clone());
//! ```

mod error;
mod ledger;
mod policy;
pub mod store;
mod sync;

pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use ledger::{RuleDelta, RuleLedger, EVENT_CHANNEL_CAPACITY};
pub use policy::{MaintainerPolicy, MaintainerSet};
pub use store::{LedgerMeta, LedgerStore, MemoryStore, SqliteStore};
pub use sync::SyncCoordinator;
