//! Sidecar files that travel next to a script
//!
//! For a script at `P`:
//! - `P.asmlist` holds the library manifest, one entry per line
//! - `P.sign` holds the hex signature over script text plus manifest text
//!
//! The gate only ever reads these. The signature file is written by the sign
//! operation, and always as a whole file.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::TrustError;

/// Suffix of the library manifest sidecar
pub const MANIFEST_SUFFIX: &str = ".asmlist";

/// Suffix of the signature sidecar
pub const SIGNATURE_SUFFIX: &str = ".sign";

/// Locations of the sidecars that belong to one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSidecars {
    pub manifest: PathBuf,
    pub signature: PathBuf,
}

impl ScriptSidecars {
    /// Derive sidecar paths by suffixing the script path
    pub fn for_script(script: &Path) -> Self {
        Self {
            manifest: suffixed(script, MANIFEST_SUFFIX),
            signature: suffixed(script, SIGNATURE_SUFFIX),
        }
    }

    /// Whether the script carries a signature and must therefore be verified
    pub fn is_signed(&self) -> bool {
        self.signature.is_file()
    }

    /// Load the manifest, or an empty one if the sidecar does not exist
    pub fn load_manifest(&self) -> io::Result<LibraryManifest> {
        if !self.manifest.exists() {
            debug!("No library manifest at {}", self.manifest.display());
            return Ok(LibraryManifest::default());
        }

        let raw = fs::read(&self.manifest)?;
        let manifest = LibraryManifest::from_bytes(raw)?;
        debug!(
            "Loaded library manifest {} ({} entries)",
            self.manifest.display(),
            manifest.entries().len()
        );
        Ok(manifest)
    }

    /// Read the signature record, if present
    pub fn read_signature(&self) -> io::Result<Option<String>> {
        if !self.signature.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.signature).map(Some)
    }

    /// Write the signature record as a single unit.
    ///
    /// The text goes to a temporary file in the same directory which is then
    /// renamed over `P.sign`, so a failure never leaves a partial record.
    pub fn write_signature(&self, signature_hex: &str) -> Result<(), TrustError> {
        let write_error = |source: io::Error| TrustError::SignatureWriteError {
            path: self.signature.clone(),
            source,
        };

        let dir = self
            .signature
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        staged
            .write_all(signature_hex.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(write_error)?;
        staged
            .persist(&self.signature)
            .map_err(|e| write_error(e.error))?;

        info!("Signature written to {}", self.signature.display());
        Ok(())
    }
}

/// Ordered library entries plus the exact text they were read from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryManifest {
    raw: Vec<u8>,
    entries: Vec<String>,
}

impl LibraryManifest {
    /// Parse manifest text. Entries are trimmed and blank lines skipped.
    pub fn from_bytes(raw: Vec<u8>) -> io::Result<Self> {
        let text = std::str::from_utf8(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Self { raw, entries })
    }

    /// Raw bytes, as they take part in the signed payload
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
