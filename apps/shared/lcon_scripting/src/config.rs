use std::path::PathBuf;

/// Configuration for the scripting layer
///
/// Contains the data directory the sandbox resolves against and the limits the
/// bridge enforces.
#[derive(Clone, Debug)]
pub struct ScriptConfig {
    /// Directory holding the data modules; script file paths resolve against it
    working_dir: PathBuf,
    /// Suffix marking a module directory
    module_suffix: String,
    /// Module used as fallback for random preset lookups
    base_module: String,
    /// Number of file slots scripts can hold open at once
    max_open_files: usize,
    /// Most bytes `ReadLine` returns in one call, terminator included
    max_line_length: usize,
    /// Size of the incremental garbage collection step run every update
    gc_step_kbytes: u32,
    /// Seed for random preset selection; entropy when unset
    rng_seed: Option<u64>,
}

impl ScriptConfig {
    /// Create a configuration with default limits
    ///
    /// # Arguments
    /// * `working_dir` - Directory holding the `*.rte` data modules
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            module_suffix: ".rte".to_string(),
            base_module: "Base.rte".to_string(),
            max_open_files: 32,
            max_line_length: 4095,
            gc_step_kbytes: 1,
            rng_seed: None,
        }
    }

    pub fn with_module_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.module_suffix = suffix.into();
        self
    }

    pub fn with_base_module(mut self, module: impl Into<String>) -> Self {
        self.base_module = module.into();
        self
    }

    pub fn with_max_open_files(mut self, count: usize) -> Self {
        self.max_open_files = count;
        self
    }

    pub fn with_max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    pub fn with_gc_step_kbytes(mut self, kbytes: u32) -> Self {
        self.gc_step_kbytes = kbytes;
        self
    }

    /// Make random preset selection reproducible
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    pub fn module_suffix(&self) -> &str {
        &self.module_suffix
    }

    pub fn base_module(&self) -> &str {
        &self.base_module
    }

    pub fn max_open_files(&self) -> usize {
        self.max_open_files
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn gc_step_kbytes(&self) -> u32 {
        self.gc_step_kbytes
    }

    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}
