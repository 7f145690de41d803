//! Encrypted rules and per-client sync cursors.

use crate::{Ciphertext, ClientId, RuleId, Timestamp};
use serde::{Deserialize, Serialize};

/// The three encrypted payload fields of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFields {
    /// Encrypted domain pattern (e.g. `*.ads.example`).
    pub domain_pattern: Ciphertext,
    /// Encrypted path pattern (e.g. `/track*`).
    pub path_pattern: Ciphertext,
    /// Encrypted rule type (`block` or `allow`).
    pub rule_type: Ciphertext,
}

impl RuleFields {
    /// Creates a new field set.
    pub fn new(domain_pattern: Ciphertext, path_pattern: Ciphertext, rule_type: Ciphertext) -> Self {
        Self {
            domain_pattern,
            path_pattern,
            rule_type,
        }
    }

    /// Returns the fields in wire order: domain, path, type.
    pub fn ciphertexts(&self) -> [&Ciphertext; 3] {
        [&self.domain_pattern, &self.path_pattern, &self.rule_type]
    }
}

/// A rule as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Ledger-assigned id.
    pub id: RuleId,
    /// Encrypted payload.
    pub fields: RuleFields,
    /// Time of the rule's creation or most recent update.
    pub changed_at: Timestamp,
}

/// How far a client has incorporated the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSyncState {
    pub client_id: ClientId,
    /// Sync cursor. Rules changed strictly after this are still owed.
    pub last_synced_at: Timestamp,
}

impl ClientSyncState {
    /// Creates a cursor at the epoch.
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            last_synced_at: Timestamp::ZERO,
        }
    }

    /// Moves the cursor forward to `to`. Never moves it backwards.
    /// Returns true if the cursor changed.
    pub fn advance(&mut self, to: Timestamp) -> bool {
        if to > self.last_synced_at {
            self.last_synced_at = to;
            true
        } else {
            false
        }
    }
}
