//! Per-client match and decryption state.
//!
//! Each client owns at most one pending match and at most one decryption
//! ticket. Both are indexed by the request id the backend minted for them,
//! and a callback is only ever resolved through that index, so a request
//! id that was overwritten or already consumed can never reach a client's
//! state again.

use crate::error::{CoordinatorError, CoordinatorResult};
use blindfilter_compute::{Decision, SealedOutcome};
use blindfilter_types::{Ciphertext, ClientId, RequestId, Timestamp};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Lifecycle of a client's pending match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Dispatched to the backend, awaiting its callback.
    Requested,
    /// Result verified and stored.
    Processed,
}

/// A finalized match, as visible to its client. Only ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedMatch {
    pub request_id: RequestId,
    pub encrypted_match_score: Ciphertext,
    pub encrypted_should_block: Ciphertext,
    pub processed_at: Timestamp,
}

#[derive(Debug)]
enum MatchState {
    Requested,
    Processed { sealed: SealedOutcome, at: Timestamp },
}

#[derive(Debug)]
struct PendingMatch {
    request_id: RequestId,
    state: MatchState,
}

pub(crate) struct DecryptionTicket {
    pub request_id: RequestId,
    pub target: Ciphertext,
    pub waiter: oneshot::Sender<CoordinatorResult<Decision>>,
}

impl DecryptionTicket {
    fn reject_stale(self) {
        let _ = self
            .waiter
            .send(Err(CoordinatorError::StaleRequest(self.request_id)));
    }
}

#[derive(Default)]
pub(crate) struct MatchTable {
    matches: HashMap<ClientId, PendingMatch>,
    match_index: HashMap<RequestId, ClientId>,
    tickets: HashMap<ClientId, DecryptionTicket>,
    ticket_index: HashMap<RequestId, ClientId>,
}

impl MatchTable {
    /// Records a freshly dispatched match, overwriting whatever the client
    /// had. Returns the superseded request id, if any.
    pub fn begin_match(&mut self, client_id: ClientId, request_id: RequestId) -> Option<RequestId> {
        // A ticket reveals the old match's decision; it dies with it.
        self.supersede_ticket(&client_id);

        self.match_index.insert(request_id, client_id);
        let previous = self.matches.insert(
            client_id,
            PendingMatch {
                request_id,
                state: MatchState::Requested,
            },
        )?;
        self.match_index.remove(&previous.request_id);
        Some(previous.request_id)
    }

    /// The client whose match is still waiting on `request_id`.
    pub fn awaiting_match(&self, request_id: &RequestId) -> Option<ClientId> {
        let client_id = self.match_index.get(request_id)?;
        let pending = self.matches.get(client_id)?;
        match pending.state {
            MatchState::Requested if pending.request_id == *request_id => Some(*client_id),
            _ => None,
        }
    }

    /// Moves the client's match to `Processed`. The request id is spent.
    pub fn complete_match(&mut self, client_id: &ClientId, sealed: SealedOutcome, at: Timestamp) {
        if let Some(pending) = self.matches.get_mut(client_id) {
            self.match_index.remove(&pending.request_id);
            pending.state = MatchState::Processed { sealed, at };
        }
    }

    pub fn status(&self, client_id: &ClientId) -> Option<MatchStatus> {
        self.matches.get(client_id).map(|p| match p.state {
            MatchState::Requested => MatchStatus::Requested,
            MatchState::Processed { .. } => MatchStatus::Processed,
        })
    }

    pub fn processed(&self, client_id: &ClientId) -> Option<ProcessedMatch> {
        let pending = self.matches.get(client_id)?;
        match &pending.state {
            MatchState::Processed { sealed, at } => Some(ProcessedMatch {
                request_id: pending.request_id,
                encrypted_match_score: sealed.match_score.clone(),
                encrypted_should_block: sealed.should_block.clone(),
                processed_at: *at,
            }),
            MatchState::Requested => None,
        }
    }

    /// Installs a ticket, superseding any the client already held.
    /// Returns the superseded ticket's request id.
    pub fn issue_ticket(&mut self, client_id: ClientId, ticket: DecryptionTicket) -> Option<RequestId> {
        let superseded = self.supersede_ticket(&client_id);
        self.ticket_index.insert(ticket.request_id, client_id);
        self.tickets.insert(client_id, ticket);
        superseded
    }

    /// The client whose live ticket carries `request_id`.
    pub fn live_ticket(&self, request_id: &RequestId) -> Option<ClientId> {
        let client_id = self.ticket_index.get(request_id)?;
        self.tickets
            .get(client_id)
            .filter(|t| t.request_id == *request_id)
            .map(|_| *client_id)
    }

    /// Removes and returns the client's ticket.
    pub fn redeem_ticket(&mut self, client_id: &ClientId) -> Option<DecryptionTicket> {
        let ticket = self.tickets.remove(client_id)?;
        self.ticket_index.remove(&ticket.request_id);
        Some(ticket)
    }

    fn supersede_ticket(&mut self, client_id: &ClientId) -> Option<RequestId> {
        let ticket = self.redeem_ticket(client_id)?;
        let request_id = ticket.request_id;
        ticket.reject_stale();
        Some(request_id)
    }
}
