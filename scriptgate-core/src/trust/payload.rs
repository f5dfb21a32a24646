//! The byte sequence that signatures are computed and checked over
//!
//! The payload is the script text immediately followed by the raw manifest
//! text. No separator, no normalization. Signatures produced by any other
//! arrangement will not verify.

use super::hasher::hash_bytes;

/// Script bytes followed by manifest bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload {
    bytes: Vec<u8>,
}

impl CanonicalPayload {
    /// Build the payload from a script's text and its manifest's raw text.
    ///
    /// An absent manifest is passed as an empty slice and contributes nothing.
    pub fn new(script: &[u8], manifest: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(script.len() + manifest.len());
        bytes.extend_from_slice(script);
        bytes.extend_from_slice(manifest);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `sha256:<hex>` fingerprint for log correlation
    pub fn digest(&self) -> String {
        hash_bytes(&self.bytes)
    }
}
