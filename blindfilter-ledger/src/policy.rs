//! Maintainer capability checks.
//!
//! Mutating the ledger requires the maintainer capability. The check is a
//! single injected predicate rather than anything baked into the ledger.

use blindfilter_types::ClientId;
use std::collections::HashSet;

/// Decides whether a caller may add or update rules.
pub trait MaintainerPolicy: Send + Sync {
    fn is_maintainer(&self, caller: &ClientId) -> bool;
}

impl<F> MaintainerPolicy for F
where
    F: Fn(&ClientId) -> bool + Send + Sync,
{
    fn is_maintainer(&self, caller: &ClientId) -> bool {
        self(caller)
    }
}

/// A fixed allow-list of maintainers.
#[derive(Debug, Clone, Default)]
pub struct MaintainerSet {
    members: HashSet<ClientId>,
}

impl MaintainerSet {
    /// Creates a set from the given maintainers.
    pub fn new(members: impl IntoIterator<Item = ClientId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Creates a set with a single maintainer.
    pub fn single(maintainer: ClientId) -> Self {
        Self::new([maintainer])
    }

    /// Number of maintainers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if nobody may write.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MaintainerPolicy for MaintainerSet {
    fn is_maintainer(&self, caller: &ClientId) -> bool {
        self.members.contains(caller)
    }
}
