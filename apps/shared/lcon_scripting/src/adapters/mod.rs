//! Runtime Adapters
//!
//! This module contains adapters for different scripting runtimes.
//! Each adapter implements the RuntimeAdapter trait and provides language-specific bindings.

#[cfg(feature = "lua")]
pub mod lua;

#[cfg(feature = "lua")]
pub use lua::{LuaEntity, LuaRuntimeAdapter};
