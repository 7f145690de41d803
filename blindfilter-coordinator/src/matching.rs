//! Match requests and their asynchronous results.
//!
//! A match request carries the client's encrypted URL components followed
//! by every rule in the ledger, three ciphertexts per rule. The backend
//! answers later through [`MatchingCoordinator::on_match_result`]; only the
//! latest request per client can ever be answered.

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::state::CoordinatorState;
use crate::table::{MatchStatus, ProcessedMatch};
use blindfilter_compute::{CallbackSelector, ComputationBackend, MatchOutcome, Proof};
use blindfilter_ledger::RuleLedger;
use blindfilter_types::{Ciphertext, ClientId, Clock, RequestId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dispatches match computations and reconciles their callbacks.
pub struct MatchingCoordinator {
    ledger: Arc<RuleLedger>,
    backend: Arc<dyn ComputationBackend>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    /// Shared with the decryption coordinator.
    state: Arc<CoordinatorState>,
}

impl MatchingCoordinator {
    /// Creates a coordinator over `ledger` and `backend`.
    pub fn new(
        ledger: Arc<RuleLedger>,
        backend: Arc<dyn ComputationBackend>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ledger,
            backend,
            clock,
            config,
            state: Arc::new(CoordinatorState::default()),
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn ComputationBackend> {
        &self.backend
    }

    pub(crate) fn state(&self) -> &Arc<CoordinatorState> {
        &self.state
    }

    /// Builds a payload from the current rule set and dispatches it.
    ///
    /// Any earlier match for the client, finished or not, is discarded;
    /// its callback will be rejected as stale. If dispatch fails the
    /// client's previous state is left as it was.
    pub async fn request_match(
        &self,
        client_id: &ClientId,
        encrypted_domain: Ciphertext,
        encrypted_path: Ciphertext,
    ) -> CoordinatorResult<RequestId> {
        let rules = self.ledger.all_rules().await?;
        match self.config.max_payload_rules {
            Some(limit) if rules.len() > limit => {
                return Err(CoordinatorError::PayloadTooLarge {
                    rules: rules.len(),
                    limit,
                });
            }
            _ => {}
        }

        let mut payload = Vec::with_capacity(2 + 3 * rules.len());
        payload.push(encrypted_domain);
        payload.push(encrypted_path);
        for rule in &rules {
            payload.extend(rule.fields.ciphertexts().into_iter().cloned());
        }

        let _client = self.state.lock_client(client_id).await;
        let dispatch = self.state.begin_dispatch();
        let request_id = self
            .backend
            .submit_computation(payload, CallbackSelector::MatchResult)
            .await?;
        let superseded = self.state.table().await.begin_match(*client_id, request_id);
        drop(dispatch);

        if let Some(old) = superseded {
            debug!(client = %client_id, superseded = %old, "Discarded previous match request");
        }
        info!(
            client = %client_id,
            request_id = %request_id,
            rules = rules.len(),
            "Dispatched match request"
        );
        Ok(request_id)
    }

    /// Backend callback for a finished match computation.
    ///
    /// The proof is checked before anything else. Rejections of any kind
    /// leave all state untouched. Returns the client the result belonged to.
    pub async fn on_match_result(
        &self,
        request_id: RequestId,
        raw_result: &[u8],
        proof: &Proof,
    ) -> CoordinatorResult<ClientId> {
        if !self.backend.verify_proof(&request_id, raw_result, proof) {
            warn!(request_id = %request_id, "Rejected match result with invalid proof");
            return Err(CoordinatorError::InvalidProof(request_id));
        }

        let Some((client_id, mut table)) = self
            .state
            .resolve(|table| table.awaiting_match(&request_id))
            .await
        else {
            warn!(request_id = %request_id, "Rejected stale match result");
            return Err(CoordinatorError::StaleRequest(request_id));
        };

        let outcome = MatchOutcome::decode(raw_result).map_err(|e| {
            CoordinatorError::MalformedResult {
                request_id,
                reason: e.to_string(),
            }
        })?;
        let sealed = self.backend.seal_outcome(&outcome)?;
        let at = self.clock.now();
        table.complete_match(&client_id, sealed, at);
        drop(table);

        info!(client = %client_id, request_id = %request_id, at = %at, "Match processed");
        Ok(client_id)
    }

    /// Returns the client's finalized match.
    pub async fn get_processed_match(&self, client_id: &ClientId) -> CoordinatorResult<ProcessedMatch> {
        self.state
            .table()
            .await
            .processed(client_id)
            .ok_or(CoordinatorError::NotProcessed(*client_id))
    }

    /// Status of the client's current match, if it has one.
    pub async fn pending_status(&self, client_id: &ClientId) -> Option<MatchStatus> {
        self.state.table().await.status(client_id)
    }
}
