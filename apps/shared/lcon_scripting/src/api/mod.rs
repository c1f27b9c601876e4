//! Host-side API for scripts
//!
//! This module holds the runtime-agnostic pieces the bindings are built from. The
//! logic lives here; runtime-specific bindings (in adapters) only convert values.

pub mod console;
pub mod entity;
pub mod file;
pub mod path_security;
pub mod presets;

pub use console::{ConsoleApi, ConsoleRequest};
pub use entity::{Entity, EntityId, EntityKind, EntityRegistry, Owner};
pub use file::{ChannelError, FileChannelTable, OpenError, parse_mode};
pub use path_security::{PathSecurityConfig, SandboxViolation, validate_script_path};
pub use presets::{DataModule, MANIFEST_FILE, ModuleRef, PresetLookup, PresetRegistry};
