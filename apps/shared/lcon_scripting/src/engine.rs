//! Script execution engine
//!
//! Owns the interpreter adapter and the single last-error slot. Every entry point
//! catches script faults and turns them into a recorded or reported diagnostic;
//! nothing raised by a script escapes as a panic or aborts the host.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, error, info};

use crate::api::console::ConsoleRequest;
use crate::api::entity::EntityId;
use crate::error::ScriptError;
use crate::host::ScriptHost;
use crate::runtime_type::RuntimeType;
use crate::{RuntimeAdapter, ScriptedCall};

/// Chunk name used for strings typed into the console or built by the host
pub const CONSOLE_CHUNK: &str = "console";

pub struct ScriptEngine {
    adapter: Box<dyn RuntimeAdapter>,
    host: Rc<ScriptHost>,
    last_error: Option<String>,
}

impl ScriptEngine {
    /// Create an engine around an initialized adapter
    ///
    /// # Arguments
    /// * `adapter` - Interpreter with the binding surface already registered
    /// * `host` - The host state the adapter's bindings share
    pub fn new(adapter: Box<dyn RuntimeAdapter>, host: Rc<ScriptHost>) -> Self {
        info!(runtime = %adapter.runtime_type(), "Script engine ready");
        Self {
            adapter,
            host,
            last_error: None,
        }
    }

    pub fn host(&self) -> &Rc<ScriptHost> {
        &self.host
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.adapter.runtime_type()
    }

    pub fn clear_errors(&mut self) {
        self.last_error = None;
    }

    pub fn error_exists(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a failure, or forward it to the console and leave the record clear
    fn fail(&mut self, error: ScriptError, report: bool) -> ScriptError {
        let message = error.to_string();
        debug!(severity = ?error.severity(), "Script failed: {}", message);
        if report {
            self.host.report_error(&message);
            self.last_error = None;
        } else {
            self.last_error = Some(message);
        }
        error
    }

    /// Compile and run a string in the persistent interpreter state
    ///
    /// # Arguments
    /// * `text` - Script source
    /// * `report` - Print a failure to the console instead of keeping it in the record
    ///
    /// An empty string is refused without touching the error record.
    pub fn run_script_string(&mut self, text: &str, report: bool) -> Result<(), ScriptError> {
        if text.is_empty() {
            return Err(ScriptError::EmptySource);
        }
        self.adapter
            .exec(CONSOLE_CHUNK, text)
            .map_err(|e| self.fail(e, report))
    }

    /// Run a script file; relative paths resolve against the data directory
    pub fn run_script_file(&mut self, path: &str, report: bool) -> Result<(), ScriptError> {
        if path.is_empty() {
            return Err(self.fail(ScriptError::EmptyPath, report));
        }

        let resolved = self.resolve_script_path(path);
        if RuntimeType::from_extension(&resolved) != Some(self.adapter.runtime_type()) {
            debug!(path, runtime = %self.adapter.runtime_type(), "Running script file without a matching extension");
        }
        debug!("Running script file {}", resolved.display());

        self.adapter
            .exec_file(&resolved)
            .map_err(|e| self.fail(e, report))
    }

    fn resolve_script_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.host.config().working_dir().join(path)
        }
    }

    /// Invoke a script-defined function with host arguments
    ///
    /// # Arguments
    /// * `function` - Function expression, e.g. `"Mission.Update"`
    /// * `self_expr` - First argument, usually the table owning the function
    /// * `guards` - Expressions that must all be truthy for the call to happen
    /// * `entity_args` - Entities passed through the temporary argument vector
    /// * `literal_args` - Source fragments appended as further arguments
    ///
    /// Failures are always reported to the console.
    pub fn run_scripted_function(
        &mut self,
        function: &str,
        self_expr: &str,
        guards: &[String],
        entity_args: &[EntityId],
        literal_args: &[String],
    ) -> Result<(), ScriptError> {
        let mut entity_kinds = Vec::with_capacity(entity_args.len());
        for id in entity_args {
            match self.host.entity(*id) {
                Some(entity) => entity_kinds.push(entity.kind),
                None => {
                    let error = ScriptError::Script(format!(
                        "Can't pass entity {} to {}: it no longer exists",
                        id, function
                    ));
                    return Err(self.fail(error, true));
                }
            }
        }

        let call = ScriptedCall {
            function,
            self_expr,
            guards,
            entity_kinds,
            literal_args,
        };
        let source = self.adapter.compose_scripted_call(&call);
        self.host.set_temp_entities(entity_args.to_vec());
        self.run_script_string(&source, true)
    }

    /// Evaluate an expression and return whether it is truthy
    ///
    /// Errors are recorded (or reported) with a "When evaluating expression: " prefix
    /// and count as false.
    pub fn expression_is_true(&mut self, expression: &str, report: bool) -> bool {
        if expression.is_empty() {
            return false;
        }
        match self.adapter.eval_truthy(expression) {
            Ok(value) => value,
            Err(e) => {
                let error = ScriptError::Script(format!("When evaluating expression: {}", e));
                self.fail(error, report);
                false
            }
        }
    }

    pub fn global_is_defined(&self, name: &str) -> bool {
        self.adapter.global_is_defined(name)
    }

    pub fn table_entry_is_defined(&self, table: &str, key: &str) -> bool {
        self.adapter.table_entry_is_defined(table, key)
    }

    pub fn clear_user_module_cache(&mut self) {
        if let Err(e) = self.adapter.clear_user_module_cache() {
            error!("Failed to clear the module cache: {}", e);
        }
    }

    /// Per-tick work: one incremental garbage collection step
    pub fn update(&mut self) {
        self.adapter.gc_step(self.host.config().gc_step_kbytes());
    }

    pub fn memory_used(&self) -> usize {
        self.adapter.memory_used()
    }

    pub fn new_preset_id(&self) -> String {
        self.host.new_preset_id()
    }

    pub fn new_object_id(&self) -> String {
        self.host.new_object_id()
    }

    /// Lines scripts and the bridge produced since the last call
    pub fn take_output(&self) -> Vec<String> {
        self.host.console().take_lines()
    }

    pub fn take_requests(&self) -> Vec<ConsoleRequest> {
        self.host.console().take_requests()
    }

    /// Close script files and release entities scripts never gave back
    ///
    /// Returns the number of leaked entities.
    pub fn shutdown(&mut self) -> usize {
        self.last_error = None;
        self.host.shutdown()
    }
}
