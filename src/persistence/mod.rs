//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::RunStatus;
use crate::core::{EventType, Run};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Event that started the run
    pub event_type: EventType,

    /// Branch of the event
    pub branch: String,

    /// Terminal status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of steps that were invoked
    pub executed_steps: usize,

    /// Total number of declared steps
    pub total_steps: usize,

    /// Zero-based index of the step that failed the run
    pub failed_step: Option<usize>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// List all workflow names with recorded runs
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
    by_workflow: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            by_workflow: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let previous = self.runs.write().await.insert(run.run_id, run.clone());

        if previous.is_none() {
            self.by_workflow
                .write()
                .await
                .entry(run.workflow_name.clone())
                .or_default()
                .push(run.run_id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_workflow = self.by_workflow.read().await;

        let mut result: Vec<RunSummary> = by_workflow
            .get(workflow_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.by_workflow.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(run: &Run) -> RunSummary {
    RunSummary {
        run_id: run.state.run_id,
        workflow_name: run.workflow_name.clone(),
        event_type: run.event.event_type.clone(),
        branch: run.event.branch.clone(),
        status: run.state.status,
        started_at: run.state.started_at.unwrap_or_else(Utc::now),
        completed_at: run.state.completed_at,
        executed_steps: run.state.executed_steps,
        total_steps: run.state.total_steps,
        failed_step: run.state.failed_step,
    }
}
