use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::rc::Rc;

use mlua::{Lua, Value};
use tracing::{debug, info};

use super::bindings;
use crate::error::ScriptError;
use crate::host::ScriptHost;
use crate::runtime_type::RuntimeType;
use crate::{RuntimeAdapter, ScriptedCall};

/// Lua 5.4 runtime adapter
///
/// One interpreter state for the whole session. The binding surface is registered
/// in `new` and never changes afterwards.
pub struct LuaRuntimeAdapter {
    lua: Lua,
}

impl LuaRuntimeAdapter {
    /// Create the interpreter and register every binding
    ///
    /// # Errors
    /// Returns a fatal `ScriptError::Init` if the binding surface cannot be registered.
    pub fn new(host: Rc<ScriptHost>) -> Result<Self, ScriptError> {
        debug!("Initializing Lua runtime");
        let lua = Lua::new();

        Self::register(&lua, &host).map_err(|e| ScriptError::Init {
            runtime: RuntimeType::Lua.name(),
            message: e.to_string(),
        })?;

        info!(memory = lua.used_memory(), "Lua runtime initialized successfully");
        Ok(Self { lua })
    }

    fn register(lua: &Lua, host: &Rc<ScriptHost>) -> mlua::Result<()> {
        bindings::setup_environment(lua, host)?;
        bindings::setup_console_api(lua, host)?;
        bindings::setup_entity_api(lua, host)?;
        bindings::setup_file_api(lua, host)?;
        Ok(())
    }

    /// Run `f` against the interpreter, turning Lua errors and Rust panics into
    /// recovered script errors
    fn protected<R>(&self, f: impl FnOnce(&Lua) -> mlua::Result<R>) -> Result<R, ScriptError> {
        match panic::catch_unwind(AssertUnwindSafe(|| f(&self.lua))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScriptError::Script(format_lua_error(&e))),
            Err(payload) => Err(ScriptError::Panic(panic_message(payload.as_ref()))),
        }
    }
}

impl RuntimeAdapter for LuaRuntimeAdapter {
    fn runtime_type(&self) -> RuntimeType {
        RuntimeType::Lua
    }

    fn exec(&mut self, chunk_name: &str, source: &str) -> Result<(), ScriptError> {
        self.protected(|lua| lua.load(source).set_name(format!("={}", chunk_name)).exec())
    }

    fn exec_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        let source = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.protected(|lua| {
            lua.load(source.as_str())
                .set_name(format!("@{}", path.display()))
                .exec()
        })
    }

    fn eval_truthy(&mut self, expression: &str) -> Result<bool, ScriptError> {
        self.protected(|lua| {
            lua.load(format!("ExpressionResult = {};", expression))
                .set_name("=console")
                .exec()?;
            let result: Value = lua.globals().get("ExpressionResult")?;
            Ok(!matches!(result, Value::Nil | Value::Boolean(false)))
        })
    }

    fn global_is_defined(&self, name: &str) -> bool {
        matches!(self.lua.globals().get::<Value>(name), Ok(value) if !matches!(value, Value::Nil))
    }

    fn table_entry_is_defined(&self, table: &str, key: &str) -> bool {
        match self.lua.globals().get::<Value>(table) {
            Ok(Value::Table(table)) => {
                matches!(table.get::<Value>(key), Ok(value) if !matches!(value, Value::Nil))
            }
            _ => false,
        }
    }

    fn clear_user_module_cache(&mut self) -> Result<(), ScriptError> {
        self.exec(
            "console",
            "for m, n in pairs(package.loaded) do if type(n) == \"boolean\" then package.loaded[m] = nil end end",
        )
    }

    fn compose_scripted_call(&self, call: &ScriptedCall<'_>) -> String {
        compose_scripted_call(call)
    }

    fn gc_step(&mut self, kbytes: u32) {
        let kbytes = i32::try_from(kbytes).unwrap_or(i32::MAX);
        if let Err(e) = self.lua.gc_step_kbytes(kbytes) {
            debug!("Lua GC step failed: {}", e);
        }
    }

    fn memory_used(&self) -> usize {
        self.lua.used_memory()
    }
}

/// Render a host call into a scripted function as a Lua chunk
///
/// `if g1 and g2 then local entityArguments = TempEntities(); f(self, (ToK and ToK(entityArguments()) or entityArguments()), lit); end;`
pub fn compose_scripted_call(call: &ScriptedCall<'_>) -> String {
    let mut script = String::new();
    if !call.guards.is_empty() {
        script.push_str("if ");
        script.push_str(&call.guards.join(" and "));
        script.push_str(" then ");
    }
    if !call.entity_kinds.is_empty() {
        script.push_str("local entityArguments = TempEntities(); ");
    }

    let mut args: Vec<String> = Vec::new();
    if !call.self_expr.is_empty() {
        args.push(call.self_expr.to_string());
    }
    for kind in &call.entity_kinds {
        let name = kind.name();
        args.push(format!(
            "(To{name} and To{name}(entityArguments()) or entityArguments())"
        ));
    }
    args.extend(call.literal_args.iter().cloned());

    script.push_str(call.function);
    script.push('(');
    script.push_str(&args.join(", "));
    script.push_str(");");

    if !call.guards.is_empty() {
        script.push_str(" end;");
    }
    script
}

/// Error text as the console shows it: "source:line: message", no traceback
fn format_lua_error(error: &mlua::Error) -> String {
    match error {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(message) => strip_traceback(message),
        mlua::Error::CallbackError { traceback, cause } => {
            let message = format_lua_error(cause);
            match caller_location(traceback) {
                Some(location) if !has_location(&message) => format!("{}: {}", location, message),
                _ => message,
            }
        }
        _ => strip_traceback(&error.to_string()),
    }
}

fn strip_traceback(message: &str) -> String {
    match message.find("\nstack traceback:") {
        Some(index) => message[..index].to_string(),
        None => message.to_string(),
    }
}

/// "console:3" from the first traceback frame that is script code
fn caller_location(traceback: &str) -> Option<String> {
    traceback
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("[C]") && !line.starts_with("stack traceback"))
        .find_map(|line| line.find(": in ").map(|end| line[..end].to_string()))
}

fn has_location(message: &str) -> bool {
    let mut parts = message.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(source), Some(line), Some(_)) => {
            !source.is_empty() && !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
