//! Ephemeral per-run environment: a private workspace directory plus the
//! environment variables that accumulate across the run's steps.
//!
//! Nothing in here is shared between runs. The temporary directory is removed
//! when the environment is closed or dropped, whatever the run's outcome.

use crate::core::{RunContext, ENV_FILE_VAR};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors creating or maintaining a run environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to create run environment: {0}")]
    Create(#[source] std::io::Error),

    #[error("Failed to read PIPELINE_ENV file: {0}")]
    EnvFile(#[source] std::io::Error),

    #[error("Failed to remove run environment: {0}")]
    Cleanup(#[source] std::io::Error),
}

/// The isolated filesystem and variables of one run
#[derive(Debug)]
pub struct Environment {
    root: TempDir,
    workspace: PathBuf,
    env_file: PathBuf,
    vars: BTreeMap<String, String>,
    context: RunContext,
}

impl Environment {
    /// Create a fresh environment, optionally under `temp_root`
    pub fn create(
        context: RunContext,
        base_env: &BTreeMap<String, String>,
        temp_root: Option<&Path>,
    ) -> Result<Self, EnvironmentError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pipeline-run-");
        let root = match temp_root {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(EnvironmentError::Create)?;

        let workspace = root.path().join("workspace");
        let state_dir = root.path().join("state");
        fs::create_dir_all(&workspace).map_err(EnvironmentError::Create)?;
        fs::create_dir_all(&state_dir).map_err(EnvironmentError::Create)?;

        let env_file = state_dir.join("env");
        fs::write(&env_file, "").map_err(EnvironmentError::Create)?;

        let mut vars = context.builtin_env();
        vars.extend(base_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.insert(
            "PIPELINE_WORKSPACE".to_string(),
            workspace.to_string_lossy().into_owned(),
        );
        vars.insert(ENV_FILE_VAR.to_string(), env_file.to_string_lossy().into_owned());

        debug!(
            "Created environment for run {} at {}",
            context.run_id,
            root.path().display()
        );

        Ok(Self {
            root,
            workspace,
            env_file,
            vars,
            context,
        })
    }

    /// Directory steps run in
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Root of the temporary directory backing this environment
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Path exposed to steps as `PIPELINE_ENV`
    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Current environment variables
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Resolve a step's working directory inside the workspace
    pub fn working_dir(&self, relative: Option<&str>) -> PathBuf {
        match relative {
            Some(dir) => self.workspace.join(dir),
            None => self.workspace.clone(),
        }
    }

    /// Merge `KEY=VALUE` lines written by the last step, then clear the file.
    /// Returns the keys that were set.
    pub fn absorb_env_file(&mut self) -> Result<Vec<String>, EnvironmentError> {
        let content = fs::read_to_string(&self.env_file).map_err(EnvironmentError::EnvFile)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if is_valid_key(key.trim()) => {
                    let key = key.trim().to_string();
                    self.vars.insert(key.clone(), value.to_string());
                    keys.push(key);
                }
                _ => warn!("Ignoring malformed {} line: {}", ENV_FILE_VAR, line),
            }
        }

        fs::write(&self.env_file, "").map_err(EnvironmentError::EnvFile)?;
        Ok(keys)
    }

    /// Remove the environment's directory tree
    pub fn close(self) -> Result<(), EnvironmentError> {
        let run_id = self.context.run_id;
        self.root.close().map_err(EnvironmentError::Cleanup)?;
        debug!("Discarded environment for run {}", run_id);
        Ok(())
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
