//! Digest helpers for the trust system
//!
//! These fingerprints never take part in verification. They exist so that
//! log lines can name exactly which payload and which key were involved.

use sha2::{Digest, Sha256};

/// Hash a byte slice using SHA-256
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = hasher.finalize();
    format!("sha256:{}", hex::encode(hash))
}

/// Hash a string using SHA-256
pub fn hash_string(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_string() {
        let hash = hash_string("hello world");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 7 + 64); // "sha256:" + 64 hex chars
    }

    #[test]
    fn test_hash_string_deterministic() {
        let hash1 = hash_string("test content");
        let hash2 = hash_string("test content");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_bytes_matches_known_vector() {
        assert_eq!(
            hash_bytes(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
