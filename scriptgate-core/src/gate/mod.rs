//! The Execution Gate - core orchestration module.
//!
//! Runs one script through a single, fail-fast pass:
//!
//! ```text
//! Idle --> Loaded --> Verified --> Resolved --> Running --> Completed | Failed
//! ```
//!
//! Every stage before `Running` either succeeds or aborts the invocation with
//! a [`GateError`], and the engine is never reached. A failure inside the
//! engine is reported through the output capability and returned as
//! [`ExecOutcome::Failed`]; the gate itself keeps going.
//!
//! There is no retry, no cache and no timeout. A script that never returns
//! blocks its caller.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::engine::{GlobalsContext, OutputSink, ScriptEngine, ScriptSource};
use crate::resolver::{ReferenceResolver, ReferenceSet};
use crate::trust::{self, CanonicalPayload, ScriptSidecars, TrustError};
use crate::trust::sidecar::LibraryManifest;

pub mod error;

pub use error::GateError;

/// Pipeline position of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Loaded,
    Verified,
    Resolved,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Loaded => "loaded",
            Stage::Verified => "verified",
            Stage::Resolved => "resolved",
            Stage::Running => "running",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Time-ordered id correlating every log line of one exec or sign
fn invocation_id() -> String {
    Uuid::now_v7().to_string()
}

fn enter(stage: Stage) {
    debug!(stage = %stage, "Gate stage reached");
}

/// Operator-level settings that apply to every invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatePolicy {
    /// Refuse scripts that have no signature sidecar
    pub signed_only: bool,
    /// Run every script sandboxed, whatever the request says
    pub force_sandbox: bool,
}

/// Everything needed to run one script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub script: PathBuf,
    pub args: Vec<String>,
    pub sandbox: bool,
    pub cert_file: Option<PathBuf>,
}

impl ExecRequest {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            sandbox: false,
            cert_file: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn sandboxed(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_cert_file(mut self, cert_file: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(cert_file.into());
        self
    }
}

/// Terminal status of an invocation that reached the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Completed,
    Failed { diagnostic: String },
}

impl ExecOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecOutcome::Completed)
    }

    pub fn stage(&self) -> Stage {
        match self {
            ExecOutcome::Completed => Stage::Completed,
            ExecOutcome::Failed { .. } => Stage::Failed,
        }
    }
}

/// A script with its sidecars, read for one invocation
struct LoadedScript {
    source: ScriptSource,
    sidecars: ScriptSidecars,
    manifest: LibraryManifest,
}

impl LoadedScript {
    fn payload(&self) -> CanonicalPayload {
        CanonicalPayload::new(self.source.text().as_bytes(), self.manifest.raw())
    }
}

/// One gate session: an engine, an output destination and a policy.
///
/// Front ends build one per use and pass it by reference. Invocations share
/// nothing with each other beyond these three values.
pub struct ExecutionGate<E> {
    engine: E,
    output: Arc<dyn OutputSink>,
    policy: GatePolicy,
}

impl<E: ScriptEngine> ExecutionGate<E> {
    pub fn new(engine: E, output: Arc<dyn OutputSink>) -> Self {
        Self {
            engine,
            output,
            policy: GatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Run a script through the whole pipeline
    #[instrument(
        name = "gate_exec",
        skip(self, request),
        fields(
            invocation_id = %invocation_id(),
            script = %request.script.display(),
            sandbox = request.sandbox || self.policy.force_sandbox
        )
    )]
    pub async fn exec(&self, request: &ExecRequest) -> Result<ExecOutcome, GateError> {
        enter(Stage::Idle);

        let loaded = self.load(&request.script)?;
        enter(Stage::Loaded);

        self.verify(&loaded, request.cert_file.as_deref())?;
        enter(Stage::Verified);

        let sandbox = request.sandbox || self.policy.force_sandbox;
        let references = self.resolve(&loaded, sandbox)?;
        enter(Stage::Resolved);

        let globals = GlobalsContext::new(request.args.clone(), Arc::clone(&self.output));
        enter(Stage::Running);

        let outcome = match self
            .engine
            .execute(&loaded.source, &references, globals)
            .await
        {
            Ok(()) => {
                info!("Script completed");
                ExecOutcome::Completed
            }
            Err(failure) => {
                warn!("Script failed: {}", failure.diagnostic);
                self.output.write_line(&failure.diagnostic);
                ExecOutcome::Failed {
                    diagnostic: failure.diagnostic,
                }
            }
        };

        enter(outcome.stage());
        Ok(outcome)
    }

    /// Sign a script together with its manifest and write `<script>.sign`.
    ///
    /// Nothing is written unless the signature was produced in full.
    #[instrument(
        name = "gate_sign",
        skip(self),
        fields(invocation_id = %invocation_id())
    )]
    pub fn sign(&self, script: &Path, cert_file: &Path) -> Result<PathBuf, GateError> {
        let loaded = self.load(script)?;

        if !cert_file.is_file() {
            return Err(GateError::security(format!(
                "Require cert file. ({})",
                cert_file.display()
            )));
        }
        let pem = read_certificate(cert_file)?;

        let payload = loaded.payload();
        let signature = trust::sign(payload.as_bytes(), &pem)
            .map_err(|e| GateError::security(e.to_string()))?;

        loaded
            .sidecars
            .write_signature(&signature)
            .map_err(|e| match e {
                TrustError::SignatureWriteError { path, source } => GateError::io(path, source),
                other => GateError::security(other.to_string()),
            })?;

        info!(
            payload_digest = %payload.digest(),
            "Signed {}",
            script.display()
        );
        Ok(loaded.sidecars.signature)
    }

    /// Idle -> Loaded
    fn load(&self, script: &Path) -> Result<LoadedScript, GateError> {
        if !script.is_file() {
            return Err(GateError::NotFound {
                path: script.to_path_buf(),
            });
        }

        let expected = self.engine.extension();
        if script.extension().and_then(|ext| ext.to_str()) != Some(expected) {
            return Err(GateError::UnsupportedInput {
                path: script.to_path_buf(),
                expected: expected.to_string(),
            });
        }

        let text = fs::read_to_string(script).map_err(|e| GateError::io(script, e))?;
        let sidecars = ScriptSidecars::for_script(script);
        let manifest = sidecars
            .load_manifest()
            .map_err(|e| GateError::io(&sidecars.manifest, e))?;

        debug!(
            "Loaded {} ({} bytes, {} manifest entries)",
            script.display(),
            text.len(),
            manifest.entries().len()
        );

        Ok(LoadedScript {
            source: ScriptSource::new(script, text),
            sidecars,
            manifest,
        })
    }

    /// Loaded -> Verified
    fn verify(&self, loaded: &LoadedScript, cert_file: Option<&Path>) -> Result<(), GateError> {
        let signature = loaded
            .sidecars
            .read_signature()
            .map_err(|e| GateError::io(&loaded.sidecars.signature, e))?;

        let Some(signature) = signature else {
            if self.policy.signed_only {
                error!(
                    target: "security",
                    "Unsigned script refused: {}",
                    loaded.source.path().display()
                );
                return Err(GateError::security(format!(
                    "Only signed scripts may run and {} has no signature.",
                    loaded.source.path().display()
                )));
            }
            debug!("No signature sidecar - trust verification skipped");
            return Ok(());
        };

        let cert_file = match cert_file {
            Some(path) if path.is_file() => path,
            other => {
                error!(
                    target: "security",
                    "Signed script without a usable certificate: {}",
                    loaded.source.path().display()
                );
                let detail = other
                    .map(|p| format!(" ({})", p.display()))
                    .unwrap_or_default();
                return Err(GateError::security(format!("Require cert file.{detail}")));
            }
        };
        let pem = read_certificate(cert_file)?;

        let payload = loaded.payload();
        trust::check(payload.as_bytes(), &signature, &pem).map_err(|e| {
            e.log_if_security_critical();
            GateError::security(e.to_string())
        })?;

        info!(payload_digest = %payload.digest(), "Signature verified");
        Ok(())
    }

    /// Verified -> Resolved
    fn resolve(&self, loaded: &LoadedScript, sandbox: bool) -> Result<ReferenceSet, GateError> {
        let base_dir = loaded
            .source
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let references = ReferenceResolver::new(&self.engine, base_dir)
            .resolve(&loaded.manifest, sandbox)?;
        Ok(references)
    }
}

fn read_certificate(cert_file: &Path) -> Result<String, GateError> {
    fs::read_to_string(cert_file).map_err(|e| {
        GateError::security(format!(
            "Cert file {} could not be read: {e}",
            cert_file.display()
        ))
    })
}
