//! The execution engine contract.
//!
//! The gate never interprets scripts itself. It prepares a script, a resolved
//! reference set and a globals context, and hands all three to a
//! [`ScriptEngine`]. The engine also acts as the [`LibraryCatalog`] the
//! resolver consults, since only the engine knows which libraries it ships.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::resolver::ReferenceSet;

pub mod globals;
pub mod lua_runtime;

// Re-export types for public API
pub use globals::{BufferedSink, GlobalsContext, OutputSink, StdoutSink};
pub use lua_runtime::LuaRuntime;

/// A script file and its full text, read fresh for every invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    path: PathBuf,
    text: String,
}

impl ScriptSource {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Compile- or run-time failure raised by an engine, with its full diagnostic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{diagnostic}")]
pub struct ExecutionFailure {
    pub diagnostic: String,
}

impl ExecutionFailure {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

/// What an engine knows about the libraries it can expose to scripts
pub trait LibraryCatalog {
    /// File extension (without the dot) of scripts this engine runs
    fn extension(&self) -> &str;

    /// Libraries every non-sandboxed script sees without asking
    fn ambient(&self) -> Vec<String>;

    /// Whether `name` identifies a library shipped with the engine
    fn is_builtin(&self, name: &str) -> bool;

    /// Names the engine binds itself, which no module may take
    fn reserved_names(&self) -> &[&str] {
        &[]
    }
}

/// Runs prepared scripts.
///
/// All script output must have been delivered through the globals' output
/// capability by the time `execute` returns.
#[async_trait]
pub trait ScriptEngine: LibraryCatalog + Send + Sync {
    async fn execute(
        &self,
        source: &ScriptSource,
        references: &ReferenceSet,
        globals: GlobalsContext,
    ) -> Result<(), ExecutionFailure>;
}
