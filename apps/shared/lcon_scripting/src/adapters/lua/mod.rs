//! Lua Runtime Adapter
//!
//! Provides script execution on Lua 5.4 via mlua.

mod runtime;
pub mod bindings;

pub use bindings::LuaEntity;
pub use runtime::{LuaRuntimeAdapter, compose_scripted_call};
