//! API token generation and hashing.
//!
//! Raw tokens are shown once (by `plugport generate-token`) and only their
//! SHA-256 hex digest is written to the accounts file.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a new random token (64 hex chars).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hash a token for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `raw` hashes to `stored_hash`, compared in constant time.
pub fn token_matches(raw: &str, stored_hash: &str) -> bool {
    let computed = hash_token(raw);
    computed
        .as_bytes()
        .ct_eq(stored_hash.trim().to_ascii_lowercase().as_bytes())
        .into()
}
