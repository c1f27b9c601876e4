/// Application paths configuration module
///
/// Centralizes all path management for the application.
/// Initialized once at startup with custom_home parameter.

use std::path::{Path, PathBuf};
use std::fs;
use tracing::debug;

const APP_DIR_NAME: &str = "lcon";

#[derive(Clone, Debug)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    /// Initialize application paths
    ///
    /// # Arguments
    /// * `custom_home` - Optional custom home directory from LCON_HOME env variable
    pub fn new(custom_home: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let (config_dir, data_dir) = if let Some(home) = custom_home {
            let home_path = PathBuf::from(home);
            (home_path.clone(), home_path)
        } else {
            let config = dirs::config_dir()
                .ok_or("Could not determine config directory")?
                .join(APP_DIR_NAME);

            let data = dirs::data_dir()
                .ok_or("Could not determine data directory")?
                .join(APP_DIR_NAME);

            (config, data)
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            debug!("Created config directory: {}", config_dir.display());
        }

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
            debug!("Created data directory: {}", data_dir.display());
        }

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Get the data directory, where transcripts and input logs are written
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Resolve a configured output file against the data directory
    ///
    /// Absolute paths are kept as they are.
    pub fn output_file(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
