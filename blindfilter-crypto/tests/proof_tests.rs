use blindfilter_crypto::{generate_key, proof_tag, verify_tag, SecretKey, PROOF_SIZE};
use blindfilter_types::RequestId;
use hmac::{Hmac, Mac};
use proptest::prelude::*;
use sha2::Sha256;

#[test]
fn tag_verifies_for_its_request_and_result() {
    let key = generate_key();
    let rid = RequestId::new();
    let tag = proof_tag(&key, &rid, b"\x00\x00\x00\x5f\x01").unwrap();
    assert!(verify_tag(&key, &rid, b"\x00\x00\x00\x5f\x01", &tag));
}

#[test]
fn tag_is_hmac_sha256_over_request_and_result() {
    let key = SecretKey::from_bytes([0x42; 32]);
    let rid = RequestId::new();

    let mut mac = Hmac::<Sha256>::new_from_slice(&[0x42; 32]).unwrap();
    mac.update(rid.as_bytes());
    mac.update(b"result");
    let expected: [u8; PROOF_SIZE] = mac.finalize().into_bytes().into();

    assert_eq!(proof_tag(&key, &rid, b"result").unwrap(), expected);
}

#[test]
fn tag_does_not_verify_for_another_request() {
    let key = generate_key();
    let tag = proof_tag(&key, &RequestId::new(), b"result").unwrap();
    assert!(!verify_tag(&key, &RequestId::new(), b"result", &tag));
}

#[test]
fn tag_does_not_verify_under_another_key() {
    let rid = RequestId::new();
    let tag = proof_tag(&generate_key(), &rid, b"result").unwrap();
    assert!(!verify_tag(&generate_key(), &rid, b"result", &tag));
}

#[test]
fn short_proof_is_rejected() {
    let key = generate_key();
    let rid = RequestId::new();
    let tag = proof_tag(&key, &rid, b"r").unwrap();
    assert!(!verify_tag(&key, &rid, b"r", &tag[..PROOF_SIZE - 1]));
    assert!(!verify_tag(&key, &rid, b"r", &[]));
}

proptest! {
    #[test]
    fn any_result_change_breaks_the_tag(
        result in prop::collection::vec(any::<u8>(), 1..64),
        flip in any::<prop::sample::Index>(),
    ) {
        let key = generate_key();
        let rid = RequestId::new();
        let tag = proof_tag(&key, &rid, &result).unwrap();

        let mut forged = result.clone();
        let i = flip.index(forged.len());
        forged[i] ^= 0x01;

        prop_assert!(verify_tag(&key, &rid, &result, &tag));
        prop_assert!(!verify_tag(&key, &rid, &forged, &tag));
    }
}
