//! scriptgate Trust System - ECDSA provenance checks for scripts
//!
//! A script is signed together with its library manifest. The signature
//! lives next to the script in a `.sign` sidecar, and the presence of that
//! sidecar is what makes verification mandatory at exec time.
//!
//! Design Principles:
//! - Optional by default - unsigned scripts are not checked
//! - Exact payload - script bytes then manifest bytes, nothing in between
//! - Industry standard crypto - ECDSA P-256 over SHA-256

pub mod error;
pub mod hasher;
pub mod payload;
pub mod sidecar;
pub mod signer;

pub use error::TrustError;
pub use payload::CanonicalPayload;
pub use sidecar::{ScriptSidecars, MANIFEST_SUFFIX, SIGNATURE_SUFFIX};
pub use signer::{check, sign, verify, TrustKey};
