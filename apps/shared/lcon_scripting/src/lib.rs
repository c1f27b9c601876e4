//! Lcon Scripting
//!
//! The scripting bridge behind the developer console: it runs script strings and
//! files against one persistent interpreter state, keeps the last error for the
//! host, and lets scripts create, cast and destroy host entities and touch files
//! inside data modules.
//!
//! # Architecture
//!
//! - **RuntimeAdapter**: Trait every interpreter implementation provides (Lua via `mlua`)
//! - **ScriptHost**: Runtime-agnostic state the bindings operate on (entities, presets, files, output)
//! - **ScriptEngine**: Error record, run entry points and per-tick garbage collection
//! - **api**: The host-side pieces the bindings are built from

use std::path::Path;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod runtime_type;

#[cfg(feature = "lua")]
pub mod adapters;

pub use config::ScriptConfig;
pub use engine::ScriptEngine;
pub use error::{ErrorSeverity, PresetError, ScriptError};
pub use host::ScriptHost;
pub use runtime_type::RuntimeType;

use api::entity::EntityKind;

/// A host-initiated call into a script-defined function
///
/// Rendered by the adapter into one chunk of script source: the call only runs when
/// every guard expression is truthy, entity arguments are passed through the
/// temporary argument vector and cast back to their kind, literals are pasted as is.
#[derive(Debug, Clone)]
pub struct ScriptedCall<'a> {
    pub function: &'a str,
    /// Expression passed as the first argument (usually the object owning the function)
    pub self_expr: &'a str,
    pub guards: &'a [String],
    /// Kind of every entity argument, in call order
    pub entity_kinds: Vec<EntityKind>,
    pub literal_args: &'a [String],
}

/// Trait that all runtime adapters must implement
///
/// A runtime adapter wraps one interpreter state and exposes the handful of
/// primitives the engine needs. Errors come back already formatted with their
/// source and line so the engine can store them as they are.
///
/// Note: RuntimeAdapter does not require Send because interpreter states and the
/// shared `ScriptHost` are single-threaded.
pub trait RuntimeAdapter {
    fn runtime_type(&self) -> RuntimeType;

    /// Compile and run a chunk of source
    ///
    /// # Arguments
    /// * `chunk_name` - Name used when attributing errors to a source
    /// * `source` - Script text
    fn exec(&mut self, chunk_name: &str, source: &str) -> Result<(), ScriptError>;

    /// Load and run a script file
    fn exec_file(&mut self, path: &Path) -> Result<(), ScriptError>;

    /// Evaluate an expression and report its truthiness
    fn eval_truthy(&mut self, expression: &str) -> Result<bool, ScriptError>;

    /// Whether a global variable holds a non-nil value
    fn global_is_defined(&self, name: &str) -> bool;

    /// Whether `table[key]` holds a non-nil value; false when `table` is not a table
    fn table_entry_is_defined(&self, table: &str, key: &str) -> bool;

    /// Forget modules that were loaded without returning a value so they load again
    fn clear_user_module_cache(&mut self) -> Result<(), ScriptError>;

    /// Render a scripted call as source text for this runtime
    fn compose_scripted_call(&self, call: &ScriptedCall<'_>) -> String;

    /// Run one incremental garbage collection step
    fn gc_step(&mut self, kbytes: u32);

    /// Bytes currently held by the interpreter
    fn memory_used(&self) -> usize;
}
