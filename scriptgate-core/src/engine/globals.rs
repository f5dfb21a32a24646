//! Values injected into every script: forwarded arguments and an output
//! capability.
//!
//! Front ends decide where output goes by choosing the [`OutputSink`]. The
//! terminal uses [`StdoutSink`]; anything that wants to display output
//! itself (an editor window, a test) uses [`BufferedSink`].

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Destination for script output
pub trait OutputSink: Send + Sync {
    fn write(&self, text: &str);

    fn write_line(&self, text: &str);
}

/// Writes straight to the process's standard output.
///
/// A closed or broken stdout is logged at debug level and otherwise ignored;
/// the script keeps running.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        if let Err(e) = emit(&mut std::io::stdout().lock(), text, false) {
            debug!("stdout write failed: {e}");
        }
    }

    fn write_line(&self, text: &str) {
        if let Err(e) = emit(&mut std::io::stdout().lock(), text, true) {
            debug!("stdout write failed: {e}");
        }
    }
}

fn emit(out: &mut impl Write, text: &str, newline: bool) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if newline {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Collects output in memory for later display
#[derive(Debug, Default)]
pub struct BufferedSink {
    buffer: Mutex<String>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn push(&self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_str(text);
    }
}

impl OutputSink for BufferedSink {
    fn write(&self, text: &str) {
        self.push(text);
    }

    fn write_line(&self, text: &str) {
        self.push(text);
        self.push("\n");
    }
}

/// The immutable globals value handed to a script
#[derive(Clone)]
pub struct GlobalsContext {
    args: Vec<String>,
    output: Arc<dyn OutputSink>,
}

impl GlobalsContext {
    pub fn new(args: Vec<String>, output: Arc<dyn OutputSink>) -> Self {
        Self { args, output }
    }

    /// Forwarded arguments, in the order the caller supplied them
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn output(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.output)
    }
}

impl std::fmt::Debug for GlobalsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalsContext")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
