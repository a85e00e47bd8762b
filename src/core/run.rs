//! Run records and the two outcomes an event can produce

use crate::core::{
    state::{RunState, RunStatus, StepState},
    trigger::TriggerEvent,
    Workflow,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-step record of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub state: StepState,
    /// Captured stdout and stderr, secrets masked
    pub output: String,
}

/// One execution of a workflow against one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub workflow_name: String,
    pub event: TriggerEvent,
    pub state: RunState,
    pub steps: Vec<StepReport>,
}

impl Run {
    pub fn new(workflow: &Workflow, event: TriggerEvent) -> Self {
        let steps = workflow
            .steps()
            .iter()
            .map(|step| StepReport {
                index: step.index,
                id: step.id.clone(),
                name: step.name.clone(),
                state: StepState::Pending,
                output: String::new(),
            })
            .collect();

        Self {
            workflow_name: workflow.name.clone(),
            event,
            state: RunState::new(),
            steps,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn succeeded(&self) -> bool {
        self.state.status == RunStatus::Succeeded
    }

    pub fn step(&self, id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Reports of steps whose command or action was invoked, in order
    pub fn executed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.state.was_invoked())
    }

    /// The hard failure that ended the run, if any
    pub fn failure(&self) -> Option<StepFailure> {
        let index = self.state.failed_step?;
        let report = self.steps.get(index)?;
        match &report.state {
            StepState::Failed { error, exit_code, .. } => Some(StepFailure {
                step_index: index,
                step_id: report.id.clone(),
                step_name: report.name.clone(),
                exit_code: *exit_code,
                reason: error.clone(),
            }),
            _ => None,
        }
    }

    /// Captured output of every executed step, in step order
    pub fn combined_output(&self) -> String {
        let mut out = String::new();
        for report in self.executed_steps() {
            out.push_str(&format!("==> [{}] {}\n", report.index + 1, report.name));
            out.push_str(&report.output);
            if !report.output.is_empty() && !report.output.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// An enabled step's command or action returned a non-success status
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("step {} ('{}') failed: {}", .step_index + 1, .step_name, .reason)]
pub struct StepFailure {
    pub step_index: usize,
    pub step_id: String,
    pub step_name: String,
    pub exit_code: Option<i32>,
    pub reason: String,
}

/// The event did not satisfy the workflow's trigger predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMismatch {
    pub workflow_name: String,
    pub event: TriggerEvent,
}

impl fmt::Display for TriggerMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workflow '{}' is not triggered by {}",
            self.workflow_name, self.event
        )
    }
}

/// Result of presenting an event to the engine
#[derive(Debug)]
pub enum RunOutcome {
    /// The run never started
    Skipped(TriggerMismatch),
    /// The run started and reached a terminal status
    Finished(Run),
}

impl RunOutcome {
    pub fn run(&self) -> Option<&Run> {
        match self {
            RunOutcome::Finished(run) => Some(run),
            RunOutcome::Skipped(_) => None,
        }
    }

    pub fn into_run(self) -> Option<Run> {
        match self {
            RunOutcome::Finished(run) => Some(run),
            RunOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped(_))
    }
}
