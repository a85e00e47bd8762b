//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has been created but no step has been launched
    Pending,
    /// Run is executing steps
    Running,
    /// Every enabled step that had to succeed did
    Succeeded,
    /// A step failed hard
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
        }
    }

    /// Parse the form produced by [`RunStatus::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(RunStatus::Pending),
            "Running" => Some(RunStatus::Running),
            "Succeeded" => Some(RunStatus::Succeeded),
            "Failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Why a step was not launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The step is declared with `enabled: false`
    Disabled,
    /// The step's `if:` guard did not hold
    GuardNotMet,
}

/// State of a single step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not been reached yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step exited successfully
    Succeeded {
        exit_code: i32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited unsuccessfully or could not be invoked
    Failed {
        error: String,
        exit_code: Option<i32>,
        best_effort: bool,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step was never invoked
    Skipped {
        reason: SkipReason,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Whether the step's command or action was actually invoked
    pub fn was_invoked(&self) -> bool {
        matches!(
            self,
            StepState::Running { .. } | StepState::Succeeded { .. } | StepState::Failed { .. }
        )
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of declared steps
    pub total_steps: usize,

    /// Number of steps whose command or action was invoked
    pub executed_steps: usize,

    /// Index of the step that failed the run, if any
    pub failed_step: Option<usize>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            executed_steps: 0,
            failed_step: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_steps: usize) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    /// Mark run as succeeded
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed at the given step index
    pub fn fail(&mut self, step_index: usize) {
        self.status = RunStatus::Failed;
        self.failed_step = Some(step_index);
        self.completed_at = Some(Utc::now());
    }

    /// Fraction of declared steps that were invoked (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.executed_steps as f64 / self.total_steps as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
