//! Step runner outcomes and errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Action '{action}' failed: {message}")]
    Action { action: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What an invoked command or action reported back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Process exit code; -1 when the process was killed by a signal
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl StepOutcome {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A successful outcome with only stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let separator = if self.stdout.ends_with('\n') { "" } else { "\n" };
                format!("{}{}{}", self.stdout, separator, self.stderr)
            }
        }
    }
}
