//! Content digests: SHA-256 and Keccak-256.
//!
//! Keccak-256 here is the original Keccak padding used by Ethereum, not the
//! FIPS-202 SHA3-256.

use sha2::{Digest, Sha256};
use sha3::Keccak256;
use subtle::ConstantTimeEq;

/// Digests recorded for one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// Lowercase hex SHA-256 of the raw content bytes.
    pub sha256_hex: String,
    /// Lowercase hex Keccak-256 of the ASCII bytes of `sha256_hex`.
    pub derived_hex: String,
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data))
}

/// Compute both digests of `raw`.
pub fn compute(raw: &[u8]) -> ContentDigest {
    let sha256_hex = sha256_hex(raw);
    let derived_hex = keccak256_hex(sha256_hex.as_bytes());
    ContentDigest {
        sha256_hex,
        derived_hex,
    }
}

/// Constant-time comparison of two hex digests, ignoring case.
pub fn digests_match(stored: &str, current: &str) -> bool {
    let stored = stored.trim().to_ascii_lowercase();
    let current = current.trim().to_ascii_lowercase();
    stored.as_bytes().ct_eq(current.as_bytes()).into()
}
