use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use lcon_schema::Validatable;
use lcon_scripting::ScriptConfig;
use std::path::{Path, PathBuf};

/// Console configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Lua Console Configuration")]
#[schemars(description = "Configuration for the developer console and its scripting bridge")]
pub struct Config {
    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,

    /// Directory holding the data modules
    #[serde(default = "default_data_dir")]
    #[schemars(description = "Directory holding the data modules; script file access is sandboxed to it")]
    pub data_dir: String,

    /// Suffix marking a module directory
    #[serde(default = "default_module_suffix")]
    #[schemars(description = "Directory name suffix that marks a data module (e.g. '.rte')")]
    pub module_suffix: String,

    /// Module loaded first and used as random-lookup fallback
    #[serde(default = "default_base_module")]
    #[schemars(description = "Name of the base data module")]
    pub base_module: String,

    /// Open file slot limit
    #[serde(default = "default_max_open_files")]
    #[schemars(description = "Number of files scripts can hold open at once", range(min = 1, max = 1024))]
    pub max_open_files: usize,

    /// Incremental GC step per tick
    #[serde(default = "default_gc_step_kbytes")]
    #[schemars(description = "Kilobytes of garbage collection work performed every tick", range(min = 0, max = 65536))]
    pub gc_step_kbytes: u32,

    /// Fraction of the screen the open console covers
    #[serde(default = "default_console_screen_ratio")]
    #[schemars(description = "Height of the console panel as a fraction of the screen", range(min = 0.1, max = 1.0))]
    pub console_screen_ratio: f32,

    /// Transcript file name
    #[serde(default = "default_transcript_file")]
    #[schemars(description = "File the whole console transcript is saved to on exit and with F3")]
    pub transcript_file: String,

    /// Input log file name
    #[serde(default = "default_input_log_file")]
    #[schemars(description = "File the entered commands are saved to with F4")]
    pub input_log_file: String,

    /// Save the input log on exit
    #[serde(default)]
    #[schemars(description = "Also save the input log when the console shuts down")]
    pub save_input_log_on_exit: bool,

    /// Mirror console lines to the log
    #[serde(default)]
    #[schemars(description = "Mirror every console line to the application log at debug level")]
    pub log_to_cli: bool,

    /// Console tick rate in Hz
    #[serde(default = "default_tick_rate")]
    #[schemars(description = "Console update frequency in ticks per second", range(min = 1, max = 240))]
    pub tick_rate: u64,

    /// Scripts run at startup
    #[serde(default)]
    #[schemars(description = "Script files run in order after the engine starts, relative to data_dir")]
    pub autorun: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    ".".to_string()
}

fn default_module_suffix() -> String {
    ".rte".to_string()
}

fn default_base_module() -> String {
    "Base.rte".to_string()
}

fn default_max_open_files() -> usize {
    32
}

fn default_gc_step_kbytes() -> u32 {
    1
}

fn default_console_screen_ratio() -> f32 {
    0.3
}

fn default_transcript_file() -> String {
    "LogConsole.txt".to_string()
}

fn default_input_log_file() -> String {
    "LogConsoleInput.lua".to_string()
}

fn default_tick_rate() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            module_suffix: default_module_suffix(),
            base_module: default_base_module(),
            max_open_files: default_max_open_files(),
            gc_step_kbytes: default_gc_step_kbytes(),
            console_screen_ratio: default_console_screen_ratio(),
            transcript_file: default_transcript_file(),
            input_log_file: default_input_log_file(),
            save_input_log_on_exit: false,
            log_to_cli: false,
            tick_rate: default_tick_rate(),
            autorun: Vec::new(),
        }
    }
}

impl Config {
    /// Resolve the data module directory
    ///
    /// Relative paths resolve against the custom home when one is given, otherwise
    /// against the process working directory.
    pub fn resolve_data_dir(&self, custom_home: Option<&str>) -> Result<PathBuf, String> {
        let candidate = Path::new(&self.data_dir);
        if candidate.is_absolute() {
            Ok(candidate.to_path_buf())
        } else if let Some(home) = custom_home {
            Ok(Path::new(home).join(candidate))
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(candidate))
                .map_err(|e| format!("Failed to get current directory: {}", e))
        }
    }

    /// Build the scripting layer settings for the given data directory
    pub fn script_config(&self, data_dir: impl Into<PathBuf>) -> ScriptConfig {
        ScriptConfig::new(data_dir)
            .with_module_suffix(self.module_suffix.clone())
            .with_base_module(self.base_module.clone())
            .with_max_open_files(self.max_open_files)
            .with_gc_step_kbytes(self.gc_step_kbytes)
    }
}

impl Validatable for Config {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.transcript_file, "LogConsole.txt");
        assert!((config.console_screen_ratio - 0.3).abs() < f32::EPSILON);
        assert!(!config.save_input_log_on_exit);
    }

    #[test]
    fn test_valid_json() {
        let json = r#"{
            "log_level": "debug",
            "data_dir": "./Data",
            "console_screen_ratio": 0.5,
            "save_input_log_on_exit": true,
            "autorun": ["Base.rte/Scripts/Init.lua"]
        }"#;

        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.data_dir, "./Data");
        assert!(config.save_input_log_on_exit);
        assert_eq!(config.autorun.len(), 1);
        assert_eq!(config.tick_rate, 30);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.base_module, "Base.rte");
        assert_eq!(config.max_open_files, 32);
    }

    #[test]
    fn test_schema_lists_settings() {
        let schema = Config::schema_json().unwrap();
        assert!(schema.contains("\"console_screen_ratio\""));
        assert!(schema.contains("\"autorun\""));
    }

    #[test]
    fn test_invalid_log_level() {
        let json = r#"{ "log_level": "invalid" }"#;
        assert!(Config::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_screen_ratio() {
        let json = r#"{ "console_screen_ratio": 2.5 }"#;
        assert!(Config::from_json_str(json).is_err());
    }

    #[test]
    fn test_resolve_data_dir_with_home() {
        let config = Config::default();
        let resolved = config.resolve_data_dir(Some("/srv/lcon")).unwrap();
        assert_eq!(resolved, Path::new("/srv/lcon").join("."));
    }

    #[test]
    fn test_script_config() {
        let mut config = Config::default();
        config.max_open_files = 4;
        config.module_suffix = ".mod".to_string();
        let script = config.script_config("/data");
        assert_eq!(script.max_open_files(), 4);
        assert_eq!(script.module_suffix(), ".mod");
        assert_eq!(script.working_dir(), &PathBuf::from("/data"));
    }
}
