//! Lua Runtime - Executes gated scripts on an embedded Lua 5.4 interpreter.
//!
//! A fresh interpreter is built for every execution and only the libraries in
//! the resolved reference set are opened in it. The Lua base library is
//! always present; its file loaders (`dofile`, `loadfile`) are removed unless
//! `io` was granted.

use async_trait::async_trait;
use mlua::{Function, Lua, LuaOptions, StdLib, Table, UserData, UserDataMethods, Value, Variadic};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

use super::globals::{GlobalsContext, OutputSink};
use super::{ExecutionFailure, LibraryCatalog, ScriptEngine, ScriptSource};
use crate::resolver::{LibraryReference, ReferenceSet};

/// Extension of scripts run by this engine
pub const LUA_EXTENSION: &str = "lua";

/// Globals injected into every script; no module may be bound under these
pub const INJECTED_GLOBALS: &[&str] = &["args", "console", "print"];

/// Standard libraries that may be granted to a script, by manifest name.
///
/// `debug` is never grantable.
const GRANTABLE_LIBRARIES: &[(&str, StdLib)] = &[
    ("coroutine", StdLib::COROUTINE),
    ("table", StdLib::TABLE),
    ("io", StdLib::IO),
    ("os", StdLib::OS),
    ("string", StdLib::STRING),
    ("utf8", StdLib::UTF8),
    ("math", StdLib::MATH),
    ("package", StdLib::PACKAGE),
];

fn std_lib(name: &str) -> Option<StdLib> {
    GRANTABLE_LIBRARIES
        .iter()
        .find(|(lib_name, _)| *lib_name == name)
        .map(|(_, lib)| *lib)
}

/// Lua engine for the execution gate
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaRuntime;

impl LuaRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl LibraryCatalog for LuaRuntime {
    fn extension(&self) -> &str {
        LUA_EXTENSION
    }

    fn ambient(&self) -> Vec<String> {
        GRANTABLE_LIBRARIES
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn is_builtin(&self, name: &str) -> bool {
        std_lib(name).is_some()
    }

    fn reserved_names(&self) -> &[&str] {
        INJECTED_GLOBALS
    }
}

#[async_trait]
impl ScriptEngine for LuaRuntime {
    #[instrument(
        name = "lua_execute",
        skip(self, source, references, globals),
        fields(
            script = %source.path().display(),
            reference_count = references.len(),
            evaluation_time_ms = tracing::field::Empty
        )
    )]
    async fn execute(
        &self,
        source: &ScriptSource,
        references: &ReferenceSet,
        globals: GlobalsContext,
    ) -> Result<(), ExecutionFailure> {
        let start = Instant::now();
        let source = source.clone();
        let references = references.clone();

        // The interpreter is created, used and dropped on the blocking thread
        let result = tokio::task::spawn_blocking(move || {
            run_script(&source, &references, &globals).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| ExecutionFailure::new(format!("Lua runtime task failed: {e}")))?;

        let elapsed = start.elapsed();
        tracing::Span::current().record("evaluation_time_ms", elapsed.as_millis());
        debug!("Lua execution finished in {:?}", elapsed);

        result.map_err(ExecutionFailure::new)
    }
}

fn run_script(
    source: &ScriptSource,
    references: &ReferenceSet,
    globals: &GlobalsContext,
) -> mlua::Result<()> {
    let lua = open_state(references)?;
    inject_globals(&lua, globals)?;
    load_modules(&lua, references)?;

    trace!("Executing chunk {}", source.path().display());
    lua.load(source.text())
        .set_name(format!("@{}", source.path().display()))
        .exec()
}

/// Open exactly the granted standard libraries
fn open_state(references: &ReferenceSet) -> mlua::Result<Lua> {
    let mut libs = StdLib::NONE;
    for reference in references.iter() {
        if let LibraryReference::Builtin(name) = reference {
            if let Some(lib) = std_lib(name) {
                libs = libs | lib;
            }
        }
    }

    let lua = Lua::new_with(libs, LuaOptions::new())?;
    let globals = lua.globals();

    if !references.contains_builtin("io") {
        globals.set("dofile", Value::Nil)?;
        globals.set("loadfile", Value::Nil)?;
    }

    Ok(lua)
}

/// Evaluate module references in manifest order and bind each under its name.
///
/// Runs after the globals are injected, so module chunks write through the
/// same output capability as the script.
fn load_modules(lua: &Lua, references: &ReferenceSet) -> mlua::Result<()> {
    let globals = lua.globals();

    for reference in references.iter() {
        if let LibraryReference::Module { name, path, source } = reference {
            debug!("Loading module '{}' from {}", name, path.display());
            let module: Value = lua
                .load(source.as_str())
                .set_name(format!("@{}", path.display()))
                .eval()?;

            // Make the module reachable through require() when package is open
            if let Some(package) = globals.get::<Option<Table>>("package")? {
                let loaded: Table = package.get("loaded")?;
                loaded.set(name.as_str(), module.clone())?;
            }
            globals.set(name.as_str(), module)?;
        }
    }

    Ok(())
}

/// Expose `args`, `console` and an output-bound `print` to the script
fn inject_globals(lua: &Lua, context: &GlobalsContext) -> mlua::Result<()> {
    let globals = lua.globals();

    let args = lua.create_sequence_from(context.args().iter().cloned())?;
    globals.set("args", args)?;
    globals.set("console", ScriptConsole(context.output()))?;

    let output = context.output();
    let print = lua.create_function(move |lua, values: Variadic<Value>| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(values.len());
        for value in values.iter() {
            parts.push(tostring.call::<String>(value.clone())?);
        }
        output.write_line(&parts.join("\t"));
        Ok(())
    })?;
    globals.set("print", print)?;

    Ok(())
}

/// The output capability as seen from Lua: `console:write(s)`, `console:write_line(s)`
struct ScriptConsole(Arc<dyn OutputSink>);

impl UserData for ScriptConsole {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("write", |_, this, text: String| {
            this.0.write(&text);
            Ok(())
        });
        methods.add_method("write_line", |_, this, text: String| {
            this.0.write_line(&text);
            Ok(())
        });
    }
}
