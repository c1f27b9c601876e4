//! Path Security Module
//!
//! Every file a script opens goes through `validate_script_path`, so scripts can only
//! touch files that live inside a data module.
//!
//! # Security Rules
//!
//! 1. Absolute paths are rejected
//! 2. Any `..` segment is rejected, even one that would stay inside the tree
//! 3. The first path segment must name a module root: a directory under the working
//!    directory whose name ends with the module suffix (`.rte`), or a module the host
//!    registered explicitly
//! 4. Accepted paths are resolved against the working directory
//!
//! `.` segments are dropped. Symlinks are not followed or checked; module trees are
//! trusted content.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Configuration for path security validation
#[derive(Clone, Debug)]
pub struct PathSecurityConfig {
    /// Directory relative paths are resolved against
    pub working_dir: PathBuf,
    /// Marker a directory name must end with to count as a module root
    pub module_suffix: String,
    /// Modules registered by the host, accepted even without the suffix
    pub known_modules: BTreeSet<String>,
}

impl PathSecurityConfig {
    pub fn new(working_dir: impl Into<PathBuf>, module_suffix: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            module_suffix: module_suffix.into(),
            known_modules: BTreeSet::new(),
        }
    }

    /// Register module names that are always accepted as roots
    pub fn with_known_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_modules.extend(modules.into_iter().map(Into::into));
        self
    }

    /// Whether `name` is a recognized module root
    pub fn is_module_root(&self, name: &str) -> bool {
        if self.known_modules.contains(name) {
            return true;
        }
        !self.module_suffix.is_empty()
            && name.ends_with(&self.module_suffix)
            && self.working_dir.join(name).is_dir()
    }
}

/// Why a path was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxViolation {
    #[error("Empty path")]
    Empty,

    #[error("Absolute paths are not allowed: {0}")]
    Absolute(String),

    #[error("Path traversal (..) is not allowed: {0}")]
    ParentTraversal(String),

    #[error("Path '{0}' is not inside a data module")]
    NotInModule(String),
}

/// Validate a script-supplied path and resolve it against the working directory
///
/// # Arguments
/// * `path` - Path as written by the script, e.g. `"Base.rte/Saves/log.txt"`
/// * `config` - The security configuration
///
/// # Returns
/// * `Ok(PathBuf)` - Absolute path inside a module tree
/// * `Err(SandboxViolation)` - Why the path was refused
///
/// The file itself does not need to exist, so paths for files about to be
/// created validate the same way as existing ones.
pub fn validate_script_path(
    path: &str,
    config: &PathSecurityConfig,
) -> Result<PathBuf, SandboxViolation> {
    if path.is_empty() {
        return Err(SandboxViolation::Empty);
    }

    let relative = normalize_relative(Path::new(path))?;

    let root = relative
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .ok_or(SandboxViolation::Empty)?;

    if !config.is_module_root(root) {
        return Err(SandboxViolation::NotInModule(path.to_string()));
    }

    Ok(config.working_dir.join(relative))
}

/// Strip `.` segments and refuse anything that could leave the working directory
fn normalize_relative(path: &Path) -> Result<PathBuf, SandboxViolation> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(SandboxViolation::ParentTraversal(path.display().to_string()));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SandboxViolation::Absolute(path.display().to_string()));
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SandboxViolation::Empty);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathSecurityConfig) {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Some.rte")).unwrap();
        fs::create_dir_all(temp.path().join("Plain")).unwrap();
        let config = PathSecurityConfig::new(temp.path(), ".rte");
        (temp, config)
    }

    #[test]
    fn test_path_inside_module_permitted() {
        let (temp, config) = setup();
        let resolved = validate_script_path("Some.rte/data.txt", &config).unwrap();
        assert_eq!(resolved, temp.path().join("Some.rte").join("data.txt"));
    }

    #[test]
    fn test_current_dir_segments_dropped() {
        let (temp, config) = setup();
        let resolved = validate_script_path("./Some.rte/./data.txt", &config).unwrap();
        assert_eq!(resolved, temp.path().join("Some.rte").join("data.txt"));
    }

    #[test]
    fn test_parent_traversal_blocked() {
        let (_temp, config) = setup();
        assert!(matches!(
            validate_script_path("../secrets.txt", &config),
            Err(SandboxViolation::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_script_path("Some.rte/../Some.rte/data.txt", &config),
            Err(SandboxViolation::ParentTraversal(_))
        ));
    }

    #[test]
    fn test_absolute_path_blocked() {
        let (temp, config) = setup();
        let absolute = temp.path().join("Some.rte").join("data.txt");
        assert!(matches!(
            validate_script_path(absolute.to_str().unwrap(), &config),
            Err(SandboxViolation::Absolute(_))
        ));
    }

    #[test]
    fn test_non_module_root_blocked() {
        let (_temp, config) = setup();
        assert!(matches!(
            validate_script_path("Plain/data.txt", &config),
            Err(SandboxViolation::NotInModule(_))
        ));
        // Suffix alone is not enough, the module directory must exist
        assert!(matches!(
            validate_script_path("Missing.rte/data.txt", &config),
            Err(SandboxViolation::NotInModule(_))
        ));
    }

    #[test]
    fn test_known_module_without_suffix() {
        let (temp, config) = setup();
        let config = config.with_known_modules(["Plain"]);
        let resolved = validate_script_path("Plain/data.txt", &config).unwrap();
        assert_eq!(resolved, temp.path().join("Plain").join("data.txt"));
    }

    #[test]
    fn test_empty_path() {
        let (_temp, config) = setup();
        assert_eq!(validate_script_path("", &config), Err(SandboxViolation::Empty));
        assert_eq!(validate_script_path(".", &config), Err(SandboxViolation::Empty));
    }
}
