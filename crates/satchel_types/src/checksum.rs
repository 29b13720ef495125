//! Content checksums.
//!
//! Checksums are SHA-256 over the plaintext payload, rendered as
//! lowercase hex. A content hash (rather than a rolling hash) is used so
//! a checksum mismatch reliably signals corruption or tampering.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 checksum of `bytes` as a lowercase hex string.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Returns true if `bytes` hashes to `expected`.
#[must_use]
pub fn verify(bytes: &[u8], expected: &str) -> bool {
    checksum(bytes) == expected
}
