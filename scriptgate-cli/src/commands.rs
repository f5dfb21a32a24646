//! Subcommands of the scriptgate CLI
//!
//! Each command is one variant of [`Command`], selected by clap from the name
//! token, and runs against a shared [`CommandContext`].

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

use scriptgate_core::config::GateConfig;
use scriptgate_core::engine::{LuaRuntime, OutputSink};
use scriptgate_core::gate::{ExecOutcome, ExecRequest, ExecutionGate};

/// Exit code of a script that raised an error
pub const EXIT_SCRIPT_FAILED: u8 = 1;

/// Exit code of an invocation refused before the script ran
pub const EXIT_REFUSED: u8 = 2;

#[derive(Parser, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run a script, verifying its signature first when it has one
    Exec {
        /// Script to run
        file_name: PathBuf,

        /// Arguments forwarded to the script, in order
        #[clap(long, num_args = 1..)]
        args: Vec<String>,

        /// Expose only the libraries listed in the script's manifest
        #[clap(long)]
        sandbox: bool,

        /// Key used to verify a signed script
        #[clap(long, alias = "certFile")]
        cert_file: Option<PathBuf>,
    },

    /// Sign a script together with its library manifest
    Sign {
        /// Script to sign
        file_name: PathBuf,

        /// Private key (PEM) to sign with
        #[clap(long, alias = "certFile")]
        cert_file: Option<PathBuf>,
    },

    /// Print the scriptgate version
    Version,
}

/// Everything a command needs besides its own arguments
pub struct CommandContext {
    pub config: GateConfig,
    pub output: Arc<dyn OutputSink>,
}

impl CommandContext {
    pub fn new(config: GateConfig, output: Arc<dyn OutputSink>) -> Self {
        Self { config, output }
    }

    fn gate(&self) -> ExecutionGate<LuaRuntime> {
        ExecutionGate::new(LuaRuntime::new(), Arc::clone(&self.output))
            .with_policy(self.config.policy())
    }

    /// The command-line key if given, else the configured one
    fn cert_file(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.config.cert_file.clone())
    }
}

impl Command {
    pub async fn run(self, ctx: &CommandContext) -> Result<ExitCode> {
        match self {
            Command::Exec {
                file_name,
                args,
                sandbox,
                cert_file,
            } => {
                let mut request = ExecRequest::new(&file_name)
                    .with_args(args)
                    .sandboxed(sandbox);
                if let Some(cert_file) = ctx.cert_file(cert_file) {
                    request = request.with_cert_file(cert_file);
                }
                debug!("Exec request: {:?}", request);

                let outcome = ctx
                    .gate()
                    .exec(&request)
                    .await
                    .with_context(|| format!("Refused to run {}", file_name.display()))?;

                match outcome {
                    ExecOutcome::Completed => Ok(ExitCode::SUCCESS),
                    ExecOutcome::Failed { .. } => {
                        warn!("{} failed", file_name.display());
                        Ok(ExitCode::from(EXIT_SCRIPT_FAILED))
                    }
                }
            }

            Command::Sign {
                file_name,
                cert_file,
            } => {
                let cert_file = ctx.cert_file(cert_file).with_context(|| {
                    format!(
                        "Require cert file to sign {} (pass --cert-file or set cert_file in the config)",
                        file_name.display()
                    )
                })?;

                let sign_path = ctx
                    .gate()
                    .sign(&file_name, &cert_file)
                    .with_context(|| format!("Failed to sign {}", file_name.display()))?;

                ctx.output
                    .write_line(&format!("Signed {}", sign_path.display()));
                Ok(ExitCode::SUCCESS)
            }

            Command::Version => {
                ctx.output
                    .write_line(&format!("scriptgate {}", env!("CARGO_PKG_VERSION")));
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
