//! Run context - identity of a run and the values it exposes to steps

use crate::core::trigger::TriggerEvent;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Name of the file steps append `KEY=VALUE` lines to
pub const ENV_FILE_VAR: &str = "PIPELINE_ENV";

/// Read-only facts about a run, available to every step
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The run this context belongs to
    pub run_id: Uuid,

    /// Name of the workflow being run
    pub workflow_name: String,

    /// The event that started the run
    pub event: TriggerEvent,

    /// Values exposed as `${{ vars.X }}`
    pub variables: HashMap<String, String>,
}

impl RunContext {
    pub fn new(
        run_id: Uuid,
        workflow_name: impl Into<String>,
        event: TriggerEvent,
        variables: HashMap<String, String>,
    ) -> Self {
        Self {
            run_id,
            workflow_name: workflow_name.into(),
            event,
            variables,
        }
    }

    /// Built-in environment variables every step sees
    pub fn builtin_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.insert("PIPELINE_RUN_ID".to_string(), self.run_id.to_string());
        env.insert("PIPELINE_WORKFLOW".to_string(), self.workflow_name.clone());
        env.insert("PIPELINE_EVENT".to_string(), self.event.event_type.to_string());
        env.insert("PIPELINE_BRANCH".to_string(), self.event.branch.clone());
        env
    }
}
