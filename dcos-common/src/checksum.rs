//! Digests for downloaded plugin packages and cluster certificates.

use sha2::{Digest, Sha256};

use crate::error::CommonError;

/// Lowercase hex SHA-256, the form `plugin add --checksum` takes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Verify `bytes` against an expected lowercase or uppercase hex digest.
pub fn verify_sha256(bytes: &[u8], expected: &str) -> Result<(), CommonError> {
    let actual = sha256_hex(bytes);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: expected.trim().to_lowercase(),
            actual,
        })
    }
}

/// SHA-256 fingerprint in the `AB:CD:...` form certificate viewers display.
pub fn sha256_fingerprint(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
