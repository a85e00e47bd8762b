//! Workflow configuration from YAML

use crate::core::{
    expression,
    step::{ActionRef, StepGuard},
    trigger::{EventType, Trigger, TriggerRule},
    Workflow,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events that start a run (defaults to push on `main`)
    #[serde(default)]
    pub on: Option<BTreeMap<String, Option<EventFilterConfig>>>,

    /// Environment variables visible to every step
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Workflow-declared actions, usable from `uses:`
    #[serde(default)]
    pub actions: BTreeMap<String, ActionConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default, rename = "timeout-secs")]
    pub default_timeout_secs: Option<u64>,

    /// Ordered steps
    pub steps: Vec<StepConfig>,
}

/// Branch filter for one event type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilterConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// An action declared as a command template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Command template; `${{ inputs.X }}` is replaced by the step's `with:` values
    pub run: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    /// Stable identifier (defaults to `step-<position>`)
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    pub name: String,

    /// Shell command
    #[serde(default)]
    pub run: Option<String>,

    /// Action reference (`name@version`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Parameters passed to the action
    #[serde(default)]
    pub with: BTreeMap<String, Value>,

    /// Guard expression: `success()`, `always()` or `failure()`
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Disabled steps are never invoked
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Best-effort: a failure does not stop the run
    #[serde(default)]
    pub continue_on_error: bool,

    /// Step-level environment variables
    #[serde(default)]
    pub env: BTreeMap<String, Value>,

    /// Timeout for this step (overrides the workflow default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Working directory relative to the run workspace
    #[serde(default)]
    pub working_directory: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl StepConfig {
    /// The id this step is known by, given its zero-based position
    pub fn effective_id(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| format!("step-{}", index + 1))
    }
}

/// Render a scalar YAML value as the string a shell would see
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Convert a YAML map into string values
pub fn string_map(values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect()
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("Workflow '{}' declares no steps", self.name);
        }

        self.trigger()?;

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("Workflow timeout-secs must be greater than zero");
        }

        for (key, value) in &self.env {
            let value = value_to_string(value);
            check_expressions(&value)
                .with_context(|| format!("Invalid workflow env '{}'", key))?;
            if !expression::secret_names(&value).is_empty() {
                anyhow::bail!(
                    "Workflow env '{}' references a secret; secrets belong on the steps that use them",
                    key
                );
            }
        }

        for (name, action) in &self.actions {
            check_expressions(&action.run)
                .with_context(|| format!("Invalid template for action '{}'", name))?;
            if !expression::secret_names(&action.run).is_empty() {
                anyhow::bail!(
                    "Action '{}' references a secret; pass it from the step through 'env' or 'with'",
                    name
                );
            }
        }

        let mut seen_ids = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let id = step.effective_id(index);
            if !seen_ids.insert(id.clone()) {
                anyhow::bail!("Duplicate step ID: {}", id);
            }

            match (&step.run, &step.uses) {
                (Some(_), Some(_)) => {
                    anyhow::bail!("Step '{}' declares both 'run' and 'uses'", id)
                }
                (None, None) => {
                    anyhow::bail!("Step '{}' declares neither 'run' nor 'uses'", id)
                }
                (Some(command), None) => {
                    if command.trim().is_empty() {
                        anyhow::bail!("Step '{}' has an empty 'run' command", id);
                    }
                    check_expressions(command)
                        .with_context(|| format!("Invalid command in step '{}'", id))?;
                }
                (None, Some(uses)) => {
                    let action = ActionRef::parse(uses)
                        .with_context(|| format!("Invalid 'uses' in step '{}'", id))?;
                    if action.name == "actions/checkout" {
                        if let Some(path) = step.with.get("path").map(value_to_string) {
                            if !stays_in_workspace(&path) {
                                anyhow::bail!(
                                    "Step '{}' checkout path must stay inside the workspace: {}",
                                    id,
                                    path
                                );
                            }
                        }
                    }
                }
            }

            if let Some(condition) = &step.condition {
                StepGuard::parse(condition)
                    .with_context(|| format!("Invalid 'if' in step '{}'", id))?;
            }

            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' timeout-secs must be greater than zero", id);
            }

            if let Some(dir) = &step.working_directory {
                if !stays_in_workspace(dir) {
                    anyhow::bail!(
                        "Step '{}' working-directory must stay inside the workspace: {}",
                        id,
                        dir
                    );
                }
            }

            for (key, value) in step.env.iter().chain(step.with.iter()) {
                check_expressions(&value_to_string(value))
                    .with_context(|| format!("Invalid value for '{}' in step '{}'", key, id))?;
            }
        }

        Ok(())
    }

    /// Build the trigger predicate from the `on:` section
    pub fn trigger(&self) -> Result<Trigger> {
        let Some(on) = &self.on else {
            return Ok(Trigger::default());
        };

        if on.is_empty() {
            anyhow::bail!("Workflow '{}' has an empty 'on' section", self.name);
        }

        let rules = on
            .iter()
            .map(|(event, filter)| {
                let event_type: EventType = event.parse().map_err(anyhow::Error::msg)?;
                Ok(TriggerRule {
                    event_type,
                    branches: filter.as_ref().map(|f| f.branches.clone()).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Trigger::new(rules))
    }

    /// Convert to an executable workflow
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}

/// Whether a path names a location at or below the workspace root
pub fn stays_in_workspace(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|part| matches!(part, Component::Normal(_) | Component::CurDir))
}

fn check_expressions(text: &str) -> Result<()> {
    expression::references(text).map_err(anyhow::Error::msg)?;
    Ok(())
}
