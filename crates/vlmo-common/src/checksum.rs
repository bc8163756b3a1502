//! Checksum utilities for archive verification
//!
//! Fetched archives live entirely in memory, so the primary API digests byte
//! slices; a file-based helper exists for verifying persisted datasets.

use crate::error::{Result, VlmoError};
use crate::types::ChecksumAlgorithm;
use sha2::{Digest, Sha256, Sha512};
use std::path::Path;

/// Compute the hex digest of a byte slice
pub fn digest_bytes(data: &[u8], algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
    }
}

/// Compute the hex digest of a file on disk
pub fn digest_file(path: impl AsRef<Path>, algorithm: ChecksumAlgorithm) -> Result<String> {
    let data = std::fs::read(path)?;
    Ok(digest_bytes(&data, algorithm))
}

/// Verify a byte slice against an expected hex digest
pub fn verify_bytes(data: &[u8], expected: &str, algorithm: ChecksumAlgorithm) -> Result<()> {
    let actual = digest_bytes(data, algorithm);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(VlmoError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_bytes_sha256() {
        let digest = digest_bytes(b"hello world", ChecksumAlgorithm::Sha256);
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_verify_bytes_mismatch() {
        let result = verify_bytes(b"hello world", "deadbeef", ChecksumAlgorithm::Sha256);
        assert!(matches!(result, Err(VlmoError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_digest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello world").unwrap();

        let from_file = digest_file(&path, ChecksumAlgorithm::Sha256).unwrap();
        let from_bytes = digest_bytes(b"hello world", ChecksumAlgorithm::Sha256);
        assert_eq!(from_file, from_bytes);
    }
}
