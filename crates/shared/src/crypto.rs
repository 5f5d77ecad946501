//! Cryptographic utilities for API key hashing.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a presented API key against a stored SHA-256 hex digest.
///
/// The comparison runs over every byte so timing does not depend on
/// where the first mismatch occurs.
pub fn verify_key_hash(presented: &str, expected_hash: &str) -> bool {
    let actual = sha256_hex(presented);
    let expected = expected_hash.trim().to_ascii_lowercase();
    if actual.len() != expected.len() {
        return false;
    }
    actual
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
