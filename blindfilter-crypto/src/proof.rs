//! Keyed proof tags.
//!
//! `tag = HMAC-SHA256(key, request_id || result)`. The request id is a
//! fixed 16 bytes, so a tag only verifies for the exact request id and
//! result bytes it was computed over and cannot be replayed against
//! another request.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{SecretKey, KEY_SIZE};
use blindfilter_types::RequestId;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Size of a proof tag in bytes.
pub const PROOF_SIZE: usize = 32;

fn keyed_mac(key: &SecretKey, request_id: &RequestId, result: &[u8]) -> CryptoResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.as_bytes().len(),
        }
    })?;
    mac.update(request_id.as_bytes());
    mac.update(result);
    Ok(mac)
}

/// Computes the proof tag for `result` answering `request_id`.
pub fn proof_tag(
    key: &SecretKey,
    request_id: &RequestId,
    result: &[u8],
) -> CryptoResult<[u8; PROOF_SIZE]> {
    Ok(keyed_mac(key, request_id, result)?.finalize().into_bytes().into())
}

/// Checks `proof` against the expected tag in constant time.
pub fn verify_tag(key: &SecretKey, request_id: &RequestId, result: &[u8], proof: &[u8]) -> bool {
    keyed_mac(key, request_id, result).is_ok_and(|mac| mac.verify_slice(proof).is_ok())
}
