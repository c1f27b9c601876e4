/// Runtime type enumeration
///
/// Identifies which scripting runtime runs a script file based on its extension

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    Lua,
}

impl RuntimeType {
    /// Determine runtime type from file extension
    ///
    /// # Arguments
    /// * `path` - Path to the script file
    ///
    /// # Returns
    /// The runtime type, or `None` if the extension is missing or unsupported
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "lua" => Some(RuntimeType::Lua),
            _ => None,
        }
    }

    /// Get the human-readable name of this runtime type
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeType::Lua => "Lua",
        }
    }

    /// Short name used in log fields
    pub fn log_name(&self) -> &'static str {
        match self {
            RuntimeType::Lua => "lua",
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(RuntimeType::from_extension(Path::new("Base.rte/init.lua")), Some(RuntimeType::Lua));
        assert_eq!(RuntimeType::from_extension(Path::new("Base.rte/init.js")), None);
        assert_eq!(RuntimeType::from_extension(Path::new("Base.rte/init")), None);
    }
}
