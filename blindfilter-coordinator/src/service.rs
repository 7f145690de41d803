//! Client-facing facade over the ledger and the coordinators.

use crate::config::CoordinatorConfig;
use crate::decryption::{DecryptionCoordinator, PendingDecision};
use crate::error::CoordinatorResult;
use crate::matching::MatchingCoordinator;
use crate::table::{MatchStatus, ProcessedMatch};
use blindfilter_compute::{CallbackSelector, Completion, ComputationBackend, Decision, Proof};
use blindfilter_ledger::{RuleDelta, RuleLedger, SyncCoordinator};
use blindfilter_types::{
    Ciphertext, ClientId, ClientSyncState, Clock, RequestId, Rule, RuleFields, RuleId, Timestamp,
};
use std::sync::Arc;

/// What a delivered backend completion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A match result was stored for this client.
    Matched(ClientId),
    /// A decision was disclosed.
    Decided(Decision),
}

/// Every client-facing operation in one place.
pub struct FilterService {
    ledger: Arc<RuleLedger>,
    sync: SyncCoordinator,
    matching: MatchingCoordinator,
    decryption: DecryptionCoordinator,
}

impl FilterService {
    /// Wires the coordinators around a shared ledger and backend.
    pub fn new(
        ledger: Arc<RuleLedger>,
        backend: Arc<dyn ComputationBackend>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let sync = SyncCoordinator::new(ledger.clone());
        let matching = MatchingCoordinator::new(ledger.clone(), backend, clock, config);
        let decryption = DecryptionCoordinator::new(&matching);
        Self {
            ledger,
            sync,
            matching,
            decryption,
        }
    }

    // ── Ledger ───────────────────────────────────────────────────

    pub async fn add_rule(&self, caller: &ClientId, fields: RuleFields) -> CoordinatorResult<RuleId> {
        Ok(self.ledger.add_rule(caller, fields).await?)
    }

    pub async fn update_rule(
        &self,
        caller: &ClientId,
        id: RuleId,
        fields: RuleFields,
    ) -> CoordinatorResult<()> {
        Ok(self.ledger.update_rule(caller, id, fields).await?)
    }

    pub async fn get_rule(&self, id: RuleId) -> CoordinatorResult<Rule> {
        Ok(self.ledger.get_rule(id).await?)
    }

    pub async fn rule_count(&self) -> u64 {
        self.ledger.rule_count().await
    }

    // ── Sync ─────────────────────────────────────────────────────

    pub async fn diff_since(&self, client_id: &ClientId) -> CoordinatorResult<RuleDelta> {
        Ok(self.sync.diff_since(client_id).await?)
    }

    pub async fn acknowledge(&self, client_id: &ClientId, as_of: Timestamp) -> CoordinatorResult<bool> {
        Ok(self.sync.acknowledge(client_id, as_of).await?)
    }

    pub async fn needs_update(&self, client_id: &ClientId) -> CoordinatorResult<bool> {
        Ok(self.sync.needs_update(client_id).await?)
    }

    pub async fn sync_state(&self, client_id: &ClientId) -> CoordinatorResult<ClientSyncState> {
        Ok(self.sync.sync_state(client_id).await?)
    }

    // ── Matching ─────────────────────────────────────────────────

    pub async fn request_match(
        &self,
        client_id: &ClientId,
        encrypted_domain: Ciphertext,
        encrypted_path: Ciphertext,
    ) -> CoordinatorResult<RequestId> {
        self.matching
            .request_match(client_id, encrypted_domain, encrypted_path)
            .await
    }

    pub async fn get_processed_match(&self, client_id: &ClientId) -> CoordinatorResult<ProcessedMatch> {
        self.matching.get_processed_match(client_id).await
    }

    pub async fn pending_status(&self, client_id: &ClientId) -> Option<MatchStatus> {
        self.matching.pending_status(client_id).await
    }

    pub async fn on_match_result(
        &self,
        request_id: RequestId,
        raw_result: &[u8],
        proof: &Proof,
    ) -> CoordinatorResult<ClientId> {
        self.matching.on_match_result(request_id, raw_result, proof).await
    }

    // ── Decryption ───────────────────────────────────────────────

    pub async fn request_decryption(&self, client_id: &ClientId) -> CoordinatorResult<PendingDecision> {
        self.decryption.request_decryption(client_id).await
    }

    pub async fn on_decryption_result(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &Proof,
    ) -> CoordinatorResult<Decision> {
        self.decryption
            .on_decryption_result(request_id, cleartext, proof)
            .await
    }

    /// Routes a backend completion to the callback its selector names.
    pub async fn deliver(&self, completion: Completion) -> CoordinatorResult<Delivery> {
        let Completion {
            request_id,
            callback,
            result,
            proof,
        } = completion;
        match callback {
            CallbackSelector::MatchResult => self
                .on_match_result(request_id, &result, &proof)
                .await
                .map(Delivery::Matched),
            CallbackSelector::DecryptionResult => self
                .on_decryption_result(request_id, &result, &proof)
                .await
                .map(Delivery::Decided),
        }
    }
}
