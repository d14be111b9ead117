//! API-key authentication and per-key rate limiting.
//!
//! Keys are never stored in plaintext: [`hash_key`] produces the SHA-256 hex digest
//! that [`keys::KeyStore`] looks up. Quota decisions live in [`rate_limit`].

pub mod keys;
pub mod rate_limit;

use sha2::{Digest, Sha256};

/// Prefix on every generated key, to make leaked keys greppable.
pub const KEY_PREFIX: &str = "mv_";

/// One-way hash of a presented API key.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Generate a fresh plaintext key: the prefix plus 64 hex characters.
pub fn generate_key() -> String {
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    format!("{KEY_PREFIX}{}{}", a.simple(), b.simple())
}
