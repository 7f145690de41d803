//! In-process reference backend.
//!
//! Stands in for a real homomorphic backend: it holds a symmetric key in
//! place of FHE key material, queues submissions, and evaluates them in
//! plaintext when driven with [`LocalBackend::process_next`]. Completions
//! are signed with a keyed proof tag that [`ComputationBackend::verify_proof`]
//! checks.

use crate::backend::{CallbackSelector, ComputationBackend, Proof, SealedOutcome};
use crate::codec::{decode_bool, Decision, MatchOutcome, MIN_MATCH_SCORE};
use crate::error::{ComputeError, ComputeResult};
use crate::evaluator::{evaluate, PlainRule, RuleKind};
use async_trait::async_trait;
use blindfilter_crypto::{
    generate_key, open, open_string, proof_tag, seal, seal_str, verify_tag, SecretKey,
};
use blindfilter_types::{Ciphertext, RequestId, RuleFields};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A finished backend job, ready to hand to the named callback.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request_id: RequestId,
    pub callback: CallbackSelector,
    pub result: Vec<u8>,
    pub proof: Proof,
}

#[derive(Debug)]
enum JobKind {
    Compute(Vec<Ciphertext>),
    Decrypt(Vec<Ciphertext>),
}

#[derive(Debug)]
struct Job {
    request_id: RequestId,
    callback: CallbackSelector,
    kind: JobKind,
}

/// Reference [`ComputationBackend`] that evaluates in-process.
pub struct LocalBackend {
    sealing_key: SecretKey,
    proof_key: SecretKey,
    min_match_score: u32,
    jobs: Mutex<VecDeque<Job>>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    /// Creates a backend with fresh random keys.
    pub fn new() -> Self {
        Self::with_keys(generate_key(), generate_key())
    }

    /// Creates a backend with the given sealing and proof keys.
    pub fn with_keys(sealing_key: SecretKey, proof_key: SecretKey) -> Self {
        Self {
            sealing_key,
            proof_key,
            min_match_score: MIN_MATCH_SCORE,
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Overrides the block threshold applied during evaluation.
    pub fn with_min_match_score(mut self, min_match_score: u32) -> Self {
        self.min_match_score = min_match_score;
        self
    }

    /// The block threshold applied during evaluation.
    pub fn min_match_score(&self) -> u32 {
        self.min_match_score
    }

    /// Encrypts a string under the backend key (client-side helper).
    pub fn encrypt(&self, plaintext: &str) -> ComputeResult<Ciphertext> {
        Ok(seal_str(&self.sealing_key, plaintext)?)
    }

    /// Encrypts a rule's three fields (maintainer-side helper).
    pub fn encrypt_rule(&self, domain: &str, path: &str, kind: RuleKind) -> ComputeResult<RuleFields> {
        Ok(RuleFields::new(
            self.encrypt(domain)?,
            self.encrypt(path)?,
            self.encrypt(kind.as_str())?,
        ))
    }

    /// Signs arbitrary result bytes for a request. Lets callers fabricate
    /// well-formed callbacks with chosen results.
    pub fn sign(&self, request_id: &RequestId, result: &[u8]) -> ComputeResult<Proof> {
        let tag = proof_tag(&self.proof_key, request_id, result)?;
        Ok(Proof::from_bytes(tag.to_vec()))
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.jobs().map(|q| q.len()).unwrap_or(0)
    }

    /// Request ids of queued jobs, oldest first.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.jobs()
            .map(|q| q.iter().map(|j| j.request_id).collect())
            .unwrap_or_default()
    }

    /// Runs the oldest queued job.
    pub fn process_next(&self) -> ComputeResult<Completion> {
        let job = self.jobs()?.pop_front().ok_or(ComputeError::QueueEmpty)?;
        self.run(job)
    }

    /// Runs a specific queued job, out of submission order.
    pub fn process(&self, request_id: &RequestId) -> ComputeResult<Completion> {
        let job = {
            let mut jobs = self.jobs()?;
            let pos = jobs
                .iter()
                .position(|j| &j.request_id == request_id)
                .ok_or(ComputeError::UnknownRequest(*request_id))?;
            jobs.remove(pos).ok_or(ComputeError::UnknownRequest(*request_id))?
        };
        self.run(job)
    }

    /// Drops a queued job so its callback never arrives.
    pub fn discard(&self, request_id: &RequestId) -> bool {
        match self.jobs() {
            Ok(mut jobs) => {
                let before = jobs.len();
                jobs.retain(|j| &j.request_id != request_id);
                jobs.len() != before
            }
            Err(_) => false,
        }
    }

    fn jobs(&self) -> ComputeResult<MutexGuard<'_, VecDeque<Job>>> {
        self.jobs
            .lock()
            .map_err(|_| ComputeError::Dispatch("job queue poisoned".to_string()))
    }

    fn enqueue(&self, callback: CallbackSelector, kind: JobKind) -> ComputeResult<RequestId> {
        let request_id = RequestId::new();
        self.jobs()?.push_back(Job {
            request_id,
            callback,
            kind,
        });
        Ok(request_id)
    }

    fn run(&self, job: Job) -> ComputeResult<Completion> {
        let result = match &job.kind {
            JobKind::Compute(payload) => {
                let outcome = self.evaluate_payload(payload)?;
                debug!(
                    request_id = %job.request_id,
                    rules = (payload.len() - 2) / 3,
                    "Evaluated match request"
                );
                outcome.encode()
            }
            JobKind::Decrypt(targets) => self.disclose(targets)?.encode(),
        };
        let proof = self.sign(&job.request_id, &result)?;
        Ok(Completion {
            request_id: job.request_id,
            callback: job.callback,
            result,
            proof,
        })
    }

    fn evaluate_payload(&self, payload: &[Ciphertext]) -> ComputeResult<MatchOutcome> {
        let [domain, path, rules @ ..] = payload else {
            return Err(ComputeError::Codec(format!(
                "payload needs a domain and a path, got {} values",
                payload.len()
            )));
        };
        if rules.len() % 3 != 0 {
            return Err(ComputeError::Codec(format!(
                "rule section has {} values, not a multiple of 3",
                rules.len()
            )));
        }

        let domain = open_string(&self.sealing_key, domain)?;
        let path = open_string(&self.sealing_key, path)?;
        let rules = rules
            .chunks_exact(3)
            .map(|triple| -> ComputeResult<PlainRule> {
                let kind = open_string(&self.sealing_key, &triple[2])?
                    .parse::<RuleKind>()
                    .map_err(ComputeError::Codec)?;
                Ok(PlainRule {
                    domain_pattern: open_string(&self.sealing_key, &triple[0])?,
                    path_pattern: open_string(&self.sealing_key, &triple[1])?,
                    kind,
                })
            })
            .collect::<ComputeResult<Vec<_>>>()?;

        Ok(evaluate(&rules, &domain, &path, self.min_match_score))
    }

    fn disclose(&self, targets: &[Ciphertext]) -> ComputeResult<Decision> {
        let [target] = targets else {
            return Err(ComputeError::Codec(format!(
                "expected a single disclosure target, got {}",
                targets.len()
            )));
        };
        match open(&self.sealing_key, target)?.as_slice() {
            [flag] => Ok(Decision::from(decode_bool(*flag)?)),
            other => Err(ComputeError::Codec(format!(
                "sealed bool has {} bytes",
                other.len()
            ))),
        }
    }
}

#[async_trait]
impl ComputationBackend for LocalBackend {
    async fn submit_computation(
        &self,
        payload: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId> {
        let values = payload.len();
        let request_id = self.enqueue(callback, JobKind::Compute(payload))?;
        info!(request_id = %request_id, values, "Queued computation");
        Ok(request_id)
    }

    async fn submit_decryption(
        &self,
        targets: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId> {
        let request_id = self.enqueue(callback, JobKind::Decrypt(targets))?;
        info!(request_id = %request_id, "Queued decryption");
        Ok(request_id)
    }

    fn verify_proof(&self, request_id: &RequestId, result: &[u8], proof: &Proof) -> bool {
        verify_tag(&self.proof_key, request_id, result, proof.as_bytes())
    }

    fn seal_outcome(&self, outcome: &MatchOutcome) -> ComputeResult<SealedOutcome> {
        Ok(SealedOutcome {
            match_score: seal(&self.sealing_key, &outcome.match_score.to_be_bytes())?,
            should_block: seal(&self.sealing_key, &[u8::from(outcome.should_block)])?,
        })
    }
}
