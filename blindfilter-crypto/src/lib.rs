//! Sealing and proof primitives for blindfilter.
//!
//! - ChaCha20-Poly1305 sealing of small values into opaque [`Ciphertext`]s
//! - Random key material with zeroization on drop
//! - Keyed SHA-256 proof tags binding a result to the request it answers
//!
//! These primitives back the reference computation backend. The
//! coordinators never call them directly; they only ever ask a backend to
//! verify a proof.
//!
//! [`Ciphertext`]: blindfilter_types::Ciphertext

mod cipher;
mod error;
mod key;
mod proof;

pub use cipher::{open, open_string, seal, seal_str, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{generate_key, SecretKey, KEY_SIZE};
pub use proof::{proof_tag, verify_tag, PROOF_SIZE};
