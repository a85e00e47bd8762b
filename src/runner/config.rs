//! Runner configuration

use crate::secrets::DEFAULT_SECRET_PREFIX;
use std::path::PathBuf;

/// Configuration for the step runners and run environments
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell program and leading arguments; the command string is appended
    pub shell: Vec<String>,

    /// Source tree copied into the workspace by `actions/checkout`
    pub source_dir: Option<PathBuf>,

    /// Directory under which run environments are created (system temp dir if unset)
    pub temp_root: Option<PathBuf>,

    /// Timeout applied when neither step nor workflow sets one
    pub default_timeout_secs: Option<u64>,

    /// Prefix of process environment variables holding secrets
    pub secret_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: vec!["sh".to_string(), "-e".to_string(), "-c".to_string()],
            source_dir: None,
            temp_root: None,
            default_timeout_secs: None,
            secret_prefix: DEFAULT_SECRET_PREFIX.to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: Vec<String>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.default_timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_secret_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.secret_prefix = prefix.into();
        self
    }
}
