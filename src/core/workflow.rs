//! Workflow domain model

use crate::core::{
    config::{string_map, WorkflowConfig},
    step::Step,
    trigger::{Trigger, TriggerEvent},
};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

/// A declared workflow: trigger plus ordered steps. Immutable once built.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Predicate deciding whether an event starts a run
    pub trigger: Trigger,

    /// Environment visible to every step
    pub env: BTreeMap<String, String>,

    /// Workflow-declared actions (name -> command template)
    pub actions: BTreeMap<String, String>,

    /// Variables available as `${{ vars.X }}`
    pub variables: HashMap<String, String>,

    /// Timeout applied to steps without their own
    pub default_timeout_secs: Option<u64>,

    /// Steps in declared order
    steps: Vec<Step>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step_config)| Step::from_config(step_config, index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Workflow {
            name: config.name.clone(),
            trigger: config.trigger()?,
            env: string_map(&config.env),
            actions: config
                .actions
                .iter()
                .map(|(name, action)| (name.clone(), action.run.clone()))
                .collect(),
            variables: HashMap::new(),
            default_timeout_secs: config.default_timeout_secs,
            steps,
        })
    }

    /// Set a `vars.` value before the workflow is shared with the engine
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps that will be considered for execution
    pub fn enabled_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.enabled)
    }

    /// Whether `event` starts a run of this workflow
    pub fn is_triggered_by(&self, event: &TriggerEvent) -> bool {
        self.trigger.matches(event)
    }

    /// Timeout for a step, falling back to the workflow default
    pub fn timeout_for(&self, step: &Step) -> Option<u64> {
        step.timeout_secs.or(self.default_timeout_secs)
    }
}
