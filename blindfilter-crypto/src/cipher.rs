//! Value sealing using ChaCha20-Poly1305.
//!
//! A sealed value is laid out as `nonce || ciphertext || tag` inside a
//! single [`Ciphertext`], so it can travel through the ledger as one
//! opaque blob.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;
use blindfilter_types::Ciphertext;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Seals `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &SecretKey, plaintext: &[u8]) -> CryptoResult<Ciphertext> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut bytes = Vec::with_capacity(NONCE_SIZE + sealed.len());
    bytes.extend_from_slice(&nonce_bytes);
    bytes.extend_from_slice(&sealed);
    Ok(Ciphertext::from_bytes(bytes))
}

/// Seals a UTF-8 string.
pub fn seal_str(key: &SecretKey, plaintext: &str) -> CryptoResult<Ciphertext> {
    seal(key, plaintext.as_bytes())
}

/// Opens a ciphertext produced by [`seal`].
pub fn open(key: &SecretKey, ciphertext: &Ciphertext) -> CryptoResult<Vec<u8>> {
    let bytes = ciphertext.as_bytes();
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decryption("data too short".to_string()));
    }

    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let (nonce, sealed) = bytes.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
}

/// Opens a ciphertext and interprets it as UTF-8.
pub fn open_string(key: &SecretKey, ciphertext: &Ciphertext) -> CryptoResult<String> {
    let plaintext = open(key, ciphertext)?;
    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::Decryption(format!("invalid UTF-8: {e}")))
}
