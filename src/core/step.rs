//! Step domain model

use crate::core::{
    config::{string_map, StepConfig},
    expression,
};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;

/// A single step in a workflow
#[derive(Debug, Clone)]
pub struct Step {
    /// Zero-based position in the workflow
    pub index: usize,

    /// Unique step identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// What the step invokes
    pub action: StepAction,

    /// When the step is allowed to run
    pub guard: StepGuard,

    /// Disabled steps are skipped without touching the environment
    pub enabled: bool,

    /// A failure of this step does not stop the run
    pub best_effort: bool,

    /// Step-level environment (values may contain expressions)
    pub env: BTreeMap<String, String>,

    /// Timeout in seconds, if any
    pub timeout_secs: Option<u64>,

    /// Working directory relative to the run workspace
    pub working_directory: Option<String>,

    /// Names of secrets referenced anywhere in the step, deduplicated in order of first use
    pub secrets: Vec<String>,
}

/// The two kinds of work a step can do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Literal command string run by a shell
    Run { command: String },
    /// Reference to a reusable action with parameters
    Uses {
        action: ActionRef,
        with: BTreeMap<String, String>,
    },
}

/// `name@version` reference to a reusable action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub name: String,
    pub version: Option<String>,
}

impl ActionRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (name, version) = match reference.split_once('@') {
            Some((name, version)) => {
                if version.is_empty() {
                    anyhow::bail!("Empty version in action reference '{}'", reference);
                }
                (name, Some(version.to_string()))
            }
            None => (reference, None),
        };

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            anyhow::bail!("Invalid action name in '{}'", reference);
        }

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Guard evaluated against the run's failure state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepGuard {
    /// Only while no hard failure has occurred
    #[default]
    Success,
    /// Regardless of earlier failures
    Always,
    /// Only after a hard failure
    Failure,
}

impl StepGuard {
    /// Parse `success()`, `always()` or `failure()`, optionally wrapped in `${{ }}`
    pub fn parse(condition: &str) -> Result<Self> {
        let trimmed = condition.trim();
        let inner = trimmed
            .strip_prefix("${{")
            .and_then(|s| s.strip_suffix("}}"))
            .unwrap_or(trimmed)
            .trim();

        match inner {
            "success()" => Ok(StepGuard::Success),
            "always()" => Ok(StepGuard::Always),
            "failure()" => Ok(StepGuard::Failure),
            other => anyhow::bail!("Unsupported condition '{}'", other),
        }
    }

    /// Whether a step with this guard may run given the run's state so far
    pub fn allows(&self, run_failed: bool) -> bool {
        match self {
            StepGuard::Success => !run_failed,
            StepGuard::Always => true,
            StepGuard::Failure => run_failed,
        }
    }
}

impl Step {
    /// Create a step from a validated step config
    pub fn from_config(config: &StepConfig, index: usize) -> Result<Self> {
        let action = match (&config.run, &config.uses) {
            (Some(command), None) => StepAction::Run {
                command: command.clone(),
            },
            (None, Some(uses)) => StepAction::Uses {
                action: ActionRef::parse(uses)?,
                with: string_map(&config.with),
            },
            _ => anyhow::bail!("Step '{}' must declare exactly one of 'run' or 'uses'", config.name),
        };

        let guard = match &config.condition {
            Some(condition) => StepGuard::parse(condition)?,
            None => StepGuard::default(),
        };

        let env = string_map(&config.env);

        let mut step = Step {
            index,
            id: config.effective_id(index),
            name: config.name.clone(),
            action,
            guard,
            enabled: config.enabled,
            best_effort: config.continue_on_error,
            env,
            timeout_secs: config.timeout_secs,
            working_directory: config.working_directory.clone(),
            secrets: Vec::new(),
        };
        step.secrets = step.collect_secret_names();

        Ok(step)
    }

    fn collect_secret_names(&self) -> Vec<String> {
        let mut texts: Vec<&str> = self.env.values().map(String::as_str).collect();
        match &self.action {
            StepAction::Run { command } => texts.push(command),
            StepAction::Uses { with, .. } => texts.extend(with.values().map(String::as_str)),
        }

        let mut names: Vec<String> = Vec::new();
        for text in texts {
            for name in expression::secret_names(text) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Short description of what the step invokes, safe to log
    pub fn describe(&self) -> String {
        match &self.action {
            StepAction::Run { command } => {
                let first_line = command.lines().next().unwrap_or_default();
                format!("run: {}", first_line)
            }
            StepAction::Uses { action, .. } => format!("uses: {}", action),
        }
    }
}
