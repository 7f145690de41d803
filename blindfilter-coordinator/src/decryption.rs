//! Disclosure of a finalized block/allow decision.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::matching::MatchingCoordinator;
use crate::state::CoordinatorState;
use crate::table::DecryptionTicket;
use blindfilter_compute::{CallbackSelector, ComputationBackend, Decision, Proof};
use blindfilter_types::{ClientId, RequestId};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A requested decision reveal.
///
/// Resolves once the backend's disclosure is accepted, or with
/// [`CoordinatorError::StaleRequest`] if the ticket is superseded first.
#[derive(Debug)]
pub struct PendingDecision {
    request_id: RequestId,
    receiver: oneshot::Receiver<CoordinatorResult<Decision>>,
}

impl PendingDecision {
    /// The request id the disclosure callback will carry.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Waits for the decision.
    pub async fn wait(self) -> CoordinatorResult<Decision> {
        let Self {
            request_id,
            receiver,
        } = self;
        receiver
            .await
            .unwrap_or(Err(CoordinatorError::StaleRequest(request_id)))
    }
}

/// Requests and accepts disclosure of a processed match's decision.
pub struct DecryptionCoordinator {
    backend: Arc<dyn ComputationBackend>,
    state: Arc<CoordinatorState>,
}

impl DecryptionCoordinator {
    /// Creates a coordinator sharing `matching`'s backend and match state.
    pub fn new(matching: &MatchingCoordinator) -> Self {
        Self {
            backend: matching.backend().clone(),
            state: matching.state().clone(),
        }
    }

    /// Asks the backend to reveal the client's `shouldBlock` value.
    ///
    /// Requires a processed match. Each call mints a new ticket; a ticket
    /// the client still held is superseded.
    pub async fn request_decryption(&self, client_id: &ClientId) -> CoordinatorResult<PendingDecision> {
        // Only this client's own requests can replace its processed match,
        // and they queue behind this lock.
        let _client = self.state.lock_client(client_id).await;
        let target = self
            .state
            .table()
            .await
            .processed(client_id)
            .ok_or(CoordinatorError::NotProcessed(*client_id))?
            .encrypted_should_block;

        let dispatch = self.state.begin_dispatch();
        let request_id = self
            .backend
            .submit_decryption(vec![target.clone()], CallbackSelector::DecryptionResult)
            .await?;
        let (waiter, receiver) = oneshot::channel();
        let superseded = self.state.table().await.issue_ticket(
            *client_id,
            DecryptionTicket {
                request_id,
                target,
                waiter,
            },
        );
        drop(dispatch);

        if let Some(old) = superseded {
            debug!(client = %client_id, superseded = %old, "Superseded decryption ticket");
        }
        info!(client = %client_id, request_id = %request_id, "Dispatched decryption request");
        Ok(PendingDecision {
            request_id,
            receiver,
        })
    }

    /// Backend callback carrying a disclosed decision.
    ///
    /// On success the ticket is consumed and its waiter resolved. A further
    /// reveal needs a new [`request_decryption`](Self::request_decryption).
    pub async fn on_decryption_result(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &Proof,
    ) -> CoordinatorResult<Decision> {
        if !self.backend.verify_proof(&request_id, cleartext, proof) {
            warn!(request_id = %request_id, "Rejected decryption result with invalid proof");
            return Err(CoordinatorError::InvalidProof(request_id));
        }

        let Some((client_id, mut table)) = self
            .state
            .resolve(|table| table.live_ticket(&request_id))
            .await
        else {
            warn!(request_id = %request_id, "Rejected stale decryption result");
            return Err(CoordinatorError::StaleRequest(request_id));
        };

        let decision = Decision::decode(cleartext).map_err(|e| CoordinatorError::MalformedResult {
            request_id,
            reason: e.to_string(),
        })?;
        let Some(ticket) = table.redeem_ticket(&client_id) else {
            return Err(CoordinatorError::StaleRequest(request_id));
        };
        drop(table);

        debug!(
            client = %client_id,
            request_id = %request_id,
            target_len = ticket.target.len(),
            "Decryption ticket redeemed"
        );
        // The client may have stopped waiting.
        let _ = ticket.waiter.send(Ok(decision));
        Ok(decision)
    }
}
