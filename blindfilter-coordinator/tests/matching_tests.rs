mod common;

use blindfilter_compute::{MatchOutcome, Proof, RuleKind};
use blindfilter_coordinator::{CoordinatorConfig, CoordinatorError, Delivery, ErrorKind, MatchStatus};
use blindfilter_types::{ClientId, RequestId, Timestamp};
use common::Harness;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn outcome(match_score: u32, should_block: bool) -> Vec<u8> {
    MatchOutcome {
        match_score,
        should_block,
    }
    .encode()
}

// ── requestMatch ─────────────────────────────────────────────────

#[tokio::test]
async fn request_match_dispatches_url_and_every_rule() {
    let h = Harness::new();
    h.add_rule("ads.example", "/banner", RuleKind::Block).await;
    h.add_rule("*.tracker.example", "*", RuleKind::Block).await;
    let client = ClientId::new();

    let rid = h.request_match(&client, "ads.example", "/banner").await;

    assert_eq!(h.backend.pending_ids(), vec![rid]);
    assert_eq!(h.service.pending_status(&client).await, Some(MatchStatus::Requested));
}

#[tokio::test]
async fn request_match_with_empty_ledger_still_dispatches() {
    let h = Harness::new();
    let client = ClientId::new();

    let rid = h.request_match(&client, "a.example", "/").await;
    let done = h.backend.process(&rid).unwrap();
    let delivered = h.service.deliver(done).await.unwrap();

    assert_eq!(delivered, Delivery::Matched(client));
}

#[tokio::test]
async fn payload_limit_rejects_before_dispatch() {
    let h = Harness::with_config(CoordinatorConfig::default().with_max_payload_rules(1));
    h.add_rule("a.example", "*", RuleKind::Block).await;
    h.add_rule("b.example", "*", RuleKind::Block).await;
    let client = ClientId::new();
    let (d, p) = h.encrypt_url("a.example", "/");

    let err = h.service.request_match(&client, d, p).await.unwrap_err();

    assert!(matches!(err, CoordinatorError::PayloadTooLarge { rules: 2, limit: 1 }));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.backend.pending(), 0);
    assert_eq!(h.service.pending_status(&client).await, None);
}

// ── onMatchResult ────────────────────────────────────────────────

#[tokio::test]
async fn verified_result_is_stored_as_processed() {
    let h = Harness::new();
    let client = ClientId::new();
    let rid = h.request_match(&client, "a.example", "/").await;

    h.clock.set(Timestamp::from_millis(7_000));
    let raw = outcome(95, true);
    let proof = h.backend.sign(&rid, &raw).unwrap();
    let owner = h.service.on_match_result(rid, &raw, &proof).await.unwrap();

    assert_eq!(owner, client);
    assert_eq!(h.service.pending_status(&client).await, Some(MatchStatus::Processed));
    let processed = h.service.get_processed_match(&client).await.unwrap();
    assert_eq!(processed.request_id, rid);
    assert_eq!(processed.processed_at, Timestamp::from_millis(7_000));
    // Stored re-sealed, never as the raw result bytes.
    assert_ne!(processed.encrypted_should_block.as_bytes(), &raw[4..]);
}

#[tokio::test]
async fn invalid_proof_changes_nothing() {
    let h = Harness::new();
    let client = ClientId::new();
    let rid = h.request_match(&client, "a.example", "/").await;
    let raw = outcome(95, true);

    let forged = Proof::from_bytes(vec![0u8; 32]);
    let err = h.service.on_match_result(rid, &raw, &forged).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidProof(id) if id == rid));
    assert_eq!(err.kind(), ErrorKind::InvalidProof);

    // A proof for different bytes is just as invalid.
    let other = h.backend.sign(&rid, &outcome(0, false)).unwrap();
    assert!(h.service.on_match_result(rid, &raw, &other).await.is_err());

    assert_eq!(h.service.pending_status(&client).await, Some(MatchStatus::Requested));
    assert!(h.service.get_processed_match(&client).await.is_err());

    // The request is still live for its real result.
    let proof = h.backend.sign(&rid, &raw).unwrap();
    h.service.on_match_result(rid, &raw, &proof).await.unwrap();
}

#[tokio::test]
async fn unknown_request_is_stale() {
    let h = Harness::new();
    let rid = RequestId::new();
    let raw = outcome(95, true);
    let proof = h.backend.sign(&rid, &raw).unwrap();

    let err = h.service.on_match_result(rid, &raw, &proof).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleRequest);
}

#[tokio::test]
async fn second_request_orphans_the_first() {
    let h = Harness::new();
    h.add_rule("ads.example", "*", RuleKind::Block).await;
    let client = ClientId::new();

    let first = h.request_match(&client, "ads.example", "/x").await;
    let second = h.request_match(&client, "news.example", "/x").await;

    // The second completes first; the first arrives late.
    let done = h.backend.process(&second).unwrap();
    h.service.deliver(done).await.unwrap();
    let late = h.backend.process(&first).unwrap();
    let err = h.service.deliver(late).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StaleRequest(id) if id == first));

    let processed = h.service.get_processed_match(&client).await.unwrap();
    assert_eq!(processed.request_id, second);
}

#[tokio::test]
async fn late_callback_after_reprocessing_is_stale() {
    let h = Harness::new();
    let client = ClientId::new();

    let first = h.request_match(&client, "a.example", "/").await;
    let done = h.backend.process(&first).unwrap();
    h.service.deliver(done).await.unwrap();

    // A new request replaces the processed match too.
    let second = h.request_match(&client, "a.example", "/").await;
    assert_eq!(h.service.pending_status(&client).await, Some(MatchStatus::Requested));
    let err = h.service.get_processed_match(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotProcessed);

    let raw = outcome(10, false);
    let proof = h.backend.sign(&first, &raw).unwrap();
    let err = h.service.on_match_result(first, &raw, &proof).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleRequest);
    assert_eq!(h.backend.pending_ids(), vec![second]);
}

#[tokio::test]
async fn duplicate_callback_is_rejected() {
    let h = Harness::new();
    let client = ClientId::new();
    let rid = h.request_match(&client, "a.example", "/").await;
    let done = h.backend.process(&rid).unwrap();

    h.service.deliver(done.clone()).await.unwrap();
    let first = h.service.get_processed_match(&client).await.unwrap();

    let err = h.service.deliver(done).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleRequest);
    assert_eq!(h.service.get_processed_match(&client).await.unwrap(), first);
}

#[tokio::test]
async fn malformed_result_with_valid_proof_changes_nothing() {
    let h = Harness::new();
    let client = ClientId::new();
    let rid = h.request_match(&client, "a.example", "/").await;

    for raw in [vec![], vec![0, 0, 0, 95], vec![0, 0, 0, 95, 7]] {
        let proof = h.backend.sign(&rid, &raw).unwrap();
        let err = h.service.on_match_result(rid, &raw, &proof).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::MalformedResult { request_id, .. } if request_id == rid));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
    assert_eq!(h.service.pending_status(&client).await, Some(MatchStatus::Requested));
}

#[tokio::test]
async fn clients_do_not_interfere() {
    let h = Harness::new();
    let alice = ClientId::new();
    let bob = ClientId::new();

    let a = h.request_match(&alice, "a.example", "/").await;
    let b = h.request_match(&bob, "b.example", "/").await;

    let done = h.backend.process(&b).unwrap();
    assert_eq!(h.service.deliver(done).await.unwrap(), Delivery::Matched(bob));
    assert_eq!(h.service.pending_status(&alice).await, Some(MatchStatus::Requested));

    let done = h.backend.process(&a).unwrap();
    assert_eq!(h.service.deliver(done).await.unwrap(), Delivery::Matched(alice));
}

#[tokio::test]
async fn match_uses_rule_snapshot_at_dispatch() {
    let h = Harness::new();
    let client = ClientId::new();
    let rid = h.request_match(&client, "ads.example", "/").await;

    // Added after dispatch; not part of the computation.
    h.add_rule("ads.example", "*", RuleKind::Block).await;

    let done = h.backend.process(&rid).unwrap();
    assert_eq!(MatchOutcome::decode(&done.result).unwrap().match_score, 0);
    h.service.deliver(done).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_each_get_their_own_result() {
    let h = Harness::new();
    h.add_rule("ads.example", "*", RuleKind::Block).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = h.service.clone();
        let (d, p) = h.encrypt_url("ads.example", "/x");
        handles.push(tokio::spawn(async move {
            let client = ClientId::new();
            service.request_match(&client, d, p).await.map(|rid| (client, rid))
        }));
    }
    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap().unwrap());
    }

    while let Ok(done) = h.backend.process_next() {
        h.service.deliver(done).await.unwrap();
    }
    for (client, rid) in clients {
        let processed = h.service.get_processed_match(&client).await.unwrap();
        assert_eq!(processed.request_id, rid);
    }
}

// ── slow dispatch ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_dispatch_does_not_stall_other_clients() {
    let (h, gate) = Harness::gated();
    h.add_rule("ads.example", "/banner", RuleKind::Block).await;
    let alice = ClientId::new();
    let bob = ClientId::new();
    let alice_rid = h.request_match(&alice, "ads.example", "/banner").await;

    let (submitted, release) = gate.arm();
    let service = h.service.clone();
    let (d, p) = h.encrypt_url("b.example", "/");
    let bob_task = tokio::spawn(async move { service.request_match(&bob, d, p).await });
    let bob_rid = submitted.await.unwrap();

    // Bob's submission is still open; Alice's callback and her next
    // request go through regardless.
    let done = h.backend.process(&alice_rid).unwrap();
    let delivered = tokio::time::timeout(Duration::from_secs(1), h.service.deliver(done))
        .await
        .expect("callback blocked behind another client's dispatch")
        .unwrap();
    assert_eq!(delivered, Delivery::Matched(alice));
    let (d, p) = h.encrypt_url("a.example", "/");
    tokio::time::timeout(Duration::from_secs(1), h.service.request_match(&alice, d, p))
        .await
        .expect("request blocked behind another client's dispatch")
        .unwrap();

    release.send(()).unwrap();
    assert_eq!(bob_task.await.unwrap().unwrap(), bob_rid);
    assert_eq!(h.service.pending_status(&bob).await, Some(MatchStatus::Requested));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn result_arriving_before_submit_returns_is_accepted() {
    let (h, gate) = Harness::gated();
    let client = ClientId::new();

    let (submitted, release) = gate.arm();
    let service = h.service.clone();
    let (d, p) = h.encrypt_url("a.example", "/");
    let request = tokio::spawn(async move { service.request_match(&client, d, p).await });
    let rid = submitted.await.unwrap();

    let done = h.backend.process(&rid).unwrap();
    let service = h.service.clone();
    let delivery = tokio::spawn(async move { service.deliver(done).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!delivery.is_finished());

    release.send(()).unwrap();
    assert_eq!(request.await.unwrap().unwrap(), rid);
    assert_eq!(delivery.await.unwrap().unwrap(), Delivery::Matched(client));
    let processed = h.service.get_processed_match(&client).await.unwrap();
    assert_eq!(processed.request_id, rid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_result_during_open_dispatch_is_still_rejected() {
    let (h, gate) = Harness::gated();
    let alice = ClientId::new();
    let bob = ClientId::new();
    let first = h.request_match(&alice, "a.example", "/").await;
    h.request_match(&alice, "a.example", "/").await;
    let late = h.backend.process(&first).unwrap();

    let (submitted, release) = gate.arm();
    let service = h.service.clone();
    let (d, p) = h.encrypt_url("b.example", "/");
    let bob_task = tokio::spawn(async move { service.request_match(&bob, d, p).await });
    submitted.await.unwrap();

    let service = h.service.clone();
    let delivery = tokio::spawn(async move { service.deliver(late).await });
    release.send(()).unwrap();
    bob_task.await.unwrap().unwrap();

    let err = delivery.await.unwrap().unwrap_err();
    assert!(matches!(err, CoordinatorError::StaleRequest(id) if id == first));
    assert_eq!(h.service.pending_status(&alice).await, Some(MatchStatus::Requested));
}
