//! Test helper functions for integration tests
//!
//! Shared across the test files using the tests/common/ pattern.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use p256::ecdsa::SigningKey;
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use scriptgate_core::engine::{
    ExecutionFailure, GlobalsContext, LibraryCatalog, LuaRuntime, ScriptEngine, ScriptSource,
};
use scriptgate_core::resolver::ReferenceSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A P-256 key pair written to disk as PEM files
pub struct KeyFiles {
    pub private_pem: PathBuf,
    pub public_pem: PathBuf,
}

/// Write a deterministic key pair derived from `seed` into `dir`
pub fn write_key_pair(dir: &Path, name: &str, seed: u8) -> Result<KeyFiles> {
    let key = SigningKey::from_slice(&[seed; 32])?;
    let private_pem = dir.join(format!("{name}.pem"));
    let public_pem = dir.join(format!("{name}.pub.pem"));

    fs::write(&private_pem, key.to_pkcs8_pem(LineEnding::LF)?.as_bytes())?;
    fs::write(
        &public_pem,
        key.verifying_key().to_public_key_pem(LineEnding::LF)?,
    )?;

    Ok(KeyFiles {
        private_pem,
        public_pem,
    })
}

/// Write a script and, when given, its library manifest
pub fn write_script(dir: &Path, name: &str, text: &str, manifest: Option<&str>) -> Result<PathBuf> {
    let script = dir.join(name);
    fs::write(&script, text)?;
    if let Some(manifest) = manifest {
        fs::write(dir.join(format!("{name}.asmlist")), manifest)?;
    }
    Ok(script)
}

/// Lua engine that counts how often it was asked to run something
#[derive(Default)]
pub struct RecordingEngine {
    inner: LuaRuntime,
    calls: AtomicUsize,
    last_references: std::sync::Mutex<Vec<String>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_references(&self) -> Vec<String> {
        self.last_references
            .lock()
            .map(|names| names.clone())
            .unwrap_or_default()
    }
}

impl LibraryCatalog for RecordingEngine {
    fn extension(&self) -> &str {
        self.inner.extension()
    }

    fn ambient(&self) -> Vec<String> {
        self.inner.ambient()
    }

    fn is_builtin(&self, name: &str) -> bool {
        self.inner.is_builtin(name)
    }

    fn reserved_names(&self) -> &[&str] {
        self.inner.reserved_names()
    }
}

#[async_trait]
impl ScriptEngine for RecordingEngine {
    async fn execute(
        &self,
        source: &ScriptSource,
        references: &ReferenceSet,
        globals: GlobalsContext,
    ) -> Result<(), ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut names) = self.last_references.lock() {
            *names = references.names().into_iter().map(str::to_string).collect();
        }
        self.inner.execute(source, references, globals).await
    }
}

/// Shared handle so a test can inspect the engine after handing it to a gate
pub struct SharedEngine(pub Arc<RecordingEngine>);

impl LibraryCatalog for SharedEngine {
    fn extension(&self) -> &str {
        self.0.extension()
    }

    fn ambient(&self) -> Vec<String> {
        self.0.ambient()
    }

    fn is_builtin(&self, name: &str) -> bool {
        self.0.is_builtin(name)
    }

    fn reserved_names(&self) -> &[&str] {
        self.0.reserved_names()
    }
}

#[async_trait]
impl ScriptEngine for SharedEngine {
    async fn execute(
        &self,
        source: &ScriptSource,
        references: &ReferenceSet,
        globals: GlobalsContext,
    ) -> Result<(), ExecutionFailure> {
        self.0.execute(source, references, globals).await
    }
}
