//! scriptgate - signature-gated, library-sandboxed script execution
//!
//! Script output goes to stdout. Logs and refusals go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use scriptgate_core::config::GateConfig;
use scriptgate_core::engine::StdoutSink;

mod commands;

use commands::{Command, CommandContext, EXIT_REFUSED};

/// Trace modules for pipeline tracing
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Trust,
    Resolver,
    Engine,
    Gate,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "scriptgate",
    about = "Run scripts only when their signature and library manifest check out",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable pipeline tracing (comma-separated: trust,resolver,engine,gate,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Override configuration file path (absolute)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Refuse to run scripts that carry no signature
    #[clap(long, global = true)]
    signed_only: bool,
}

/// Initialize tracing with CLI flags
///
/// Configures logging based on --log-level and --trace flags.
/// When --trace is set, enables JSON output for structured tracing.
fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for module in trace_modules {
        let directive = match module {
            TraceModule::Trust => "scriptgate_core::trust=trace",
            TraceModule::Resolver => "scriptgate_core::resolver=trace",
            TraceModule::Engine => "scriptgate_core::engine=trace",
            TraceModule::Gate => "scriptgate_core::gate=trace",
            TraceModule::All => "scriptgate_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    if !trace_modules.is_empty() {
        // JSON output for structured tracing - MUST go to stderr
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(
            trace_modules = ?trace_modules,
            "scriptgate pipeline tracing enabled"
        );
    } else {
        // Standard text output - MUST go to stderr
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config =
        GateConfig::discover_with_override(cli.config).context("Failed to load configuration")?;
    if cli.signed_only {
        config.signed_only = true;
    }

    let ctx = CommandContext::new(config, Arc::new(StdoutSink));
    cli.command.run(&ctx).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_REFUSED)
        }
    }
}
