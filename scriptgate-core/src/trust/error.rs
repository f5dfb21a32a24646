//! Trust system error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Trust system specific errors
#[derive(Error, Debug)]
pub enum TrustError {
    /// The PEM text does not hold a usable P-256 key
    #[error("Certificate does not contain a usable P-256 key ({reason})")]
    MalformedKey { reason: String },

    /// Signing was requested with a certificate that only carries a public key
    #[error("Certificate does not contain a private key.\n\nSigning requires a PKCS#8 (PRIVATE KEY) or SEC1 (EC PRIVATE KEY) PEM file.")]
    PrivateKeyRequired,

    /// The signature sidecar is not valid hex or not a P-256 signature
    #[error("Signature record is malformed ({reason})")]
    MalformedSignature { reason: String },

    /// The payload does not match the signature under the supplied key
    #[error("Signature verification failed!\n\nThe script or its library manifest was modified after signing,\nor it was signed with a different key.\n\nTo approve the current contents, run:\n  scriptgate sign <script> --cert-file <private-key.pem>")]
    SignatureMismatch,

    /// Failed to write the signature sidecar
    #[error("Failed to write signature record to {}", path.display())]
    SignatureWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Log security-critical trust errors
impl TrustError {
    pub fn log_if_security_critical(&self) {
        match self {
            TrustError::SignatureMismatch | TrustError::MalformedSignature { .. } => {
                tracing::error!(target: "security", "TRUST VIOLATION: {}", self);
            }
            _ => {}
        }
    }
}
