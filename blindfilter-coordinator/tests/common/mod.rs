//! Shared test harness for coordinator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use blindfilter_compute::{
    CallbackSelector, ComputationBackend, ComputeResult, LocalBackend, MatchOutcome, Proof, RuleKind,
    SealedOutcome,
};
use blindfilter_coordinator::{CoordinatorConfig, FilterService};
use blindfilter_ledger::{MaintainerSet, RuleLedger};
use blindfilter_types::{Ciphertext, ClientId, ManualClock, RequestId, RuleId, Timestamp};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub service: Arc<FilterService>,
    pub backend: Arc<LocalBackend>,
    pub clock: Arc<ManualClock>,
    pub maintainer: ClientId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let backend = Arc::new(LocalBackend::new());
        Self::build(config, backend.clone(), backend)
    }

    /// A harness whose computation submissions can be held open.
    pub fn gated() -> (Self, Arc<GatedBackend>) {
        let backend = Arc::new(LocalBackend::new());
        let gated = Arc::new(GatedBackend::new(backend.clone()));
        let harness = Self::build(CoordinatorConfig::default(), backend, gated.clone());
        (harness, gated)
    }

    fn build(
        config: CoordinatorConfig,
        backend: Arc<LocalBackend>,
        dispatch: Arc<dyn ComputationBackend>,
    ) -> Self {
        init_tracing();
        let maintainer = ClientId::new();
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
        let ledger = Arc::new(RuleLedger::in_memory(
            Arc::new(MaintainerSet::single(maintainer)),
            clock.clone(),
        ));
        let service = Arc::new(FilterService::new(ledger, dispatch, clock.clone(), config));
        Self {
            service,
            backend,
            clock,
            maintainer,
        }
    }

    /// Encrypts and adds a rule as the maintainer.
    pub async fn add_rule(&self, domain: &str, path: &str, kind: RuleKind) -> RuleId {
        let fields = self.backend.encrypt_rule(domain, path, kind).unwrap();
        self.service.add_rule(&self.maintainer, fields).await.unwrap()
    }

    /// Encrypts a URL's components the way a client would.
    pub fn encrypt_url(&self, domain: &str, path: &str) -> (Ciphertext, Ciphertext) {
        (
            self.backend.encrypt(domain).unwrap(),
            self.backend.encrypt(path).unwrap(),
        )
    }

    /// Requests a match for `client` against the current rules.
    pub async fn request_match(&self, client: &ClientId, domain: &str, path: &str) -> RequestId {
        let (d, p) = self.encrypt_url(domain, path);
        self.service.request_match(client, d, p).await.unwrap()
    }
}

struct Gate {
    submitted: oneshot::Sender<RequestId>,
    release: oneshot::Receiver<()>,
}

/// A [`LocalBackend`] whose next computation submission, once armed, queues
/// the job and reports its id but does not return until released. Models a
/// backend that answers before the submitting call has come back.
pub struct GatedBackend {
    inner: Arc<LocalBackend>,
    gate: Mutex<Option<Gate>>,
}

impl GatedBackend {
    pub fn new(inner: Arc<LocalBackend>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// Holds the next `submit_computation`. Yields its request id once the
    /// job is queued; the submission returns when the sender fires or drops.
    pub fn arm(&self) -> (oneshot::Receiver<RequestId>, oneshot::Sender<()>) {
        let (submitted_tx, submitted_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(Gate {
            submitted: submitted_tx,
            release: release_rx,
        });
        (submitted_rx, release_tx)
    }
}

#[async_trait]
impl ComputationBackend for GatedBackend {
    async fn submit_computation(
        &self,
        payload: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId> {
        let request_id = self.inner.submit_computation(payload, callback).await?;
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.submitted.send(request_id);
            let _ = gate.release.await;
        }
        Ok(request_id)
    }

    async fn submit_decryption(
        &self,
        targets: Vec<Ciphertext>,
        callback: CallbackSelector,
    ) -> ComputeResult<RequestId> {
        self.inner.submit_decryption(targets, callback).await
    }

    fn verify_proof(&self, request_id: &RequestId, result: &[u8], proof: &Proof) -> bool {
        self.inner.verify_proof(request_id, result, proof)
    }

    fn seal_outcome(&self, outcome: &MatchOutcome) -> ComputeResult<SealedOutcome> {
        self.inner.seal_outcome(outcome)
    }
}
