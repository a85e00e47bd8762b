//! Main execution engine - orchestrates a workflow run

use crate::{
    core::{
        Run, RunContext, RunOutcome, RunStatus, SkipReason, StepState, TriggerEvent,
        TriggerMismatch, Workflow,
    },
    environment::{Environment, EnvironmentError},
    execution::{ExecutionResult, StepExecutor},
    runner::{RunnerConfig, StepRunner},
    secrets::SecretStore,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow_name: String,
        event: TriggerEvent,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        index: usize,
        step_id: String,
        step_name: String,
    },
    StepOutput {
        run_id: Uuid,
        step_id: String,
        output: String,
    },
    StepSucceeded {
        run_id: Uuid,
        step_id: String,
    },
    StepFailed {
        run_id: Uuid,
        step_id: String,
        error: String,
        best_effort: bool,
    },
    StepSkipped {
        run_id: Uuid,
        step_id: String,
        reason: SkipReason,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
        failed_step: Option<usize>,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Errors that prevent a triggered run from executing at all
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("Run task failed: {0}")]
    Join(String),
}

/// Main workflow execution engine
pub struct ExecutionEngine<R, S> {
    executor: StepExecutor<R, S>,
    temp_root: Option<PathBuf>,
    event_handlers: Vec<EventHandler>,
}

impl<R: StepRunner + 'static, S: SecretStore + 'static> ExecutionEngine<R, S> {
    pub fn new(runner: R, secrets: S) -> Self {
        Self {
            executor: StepExecutor::new(runner, secrets),
            temp_root: None,
            event_handlers: Vec::new(),
        }
    }

    /// Apply environment placement and timeout defaults from the runner config
    pub fn with_config(mut self, config: &RunnerConfig) -> Self {
        self.executor = self.executor.with_default_timeout(config.default_timeout_secs);
        self.temp_root = config.temp_root.clone();
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Present one event to the workflow
    ///
    /// Returns [`RunOutcome::Skipped`] without creating an environment or
    /// emitting anything when the trigger does not match.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        event: TriggerEvent,
    ) -> Result<RunOutcome, EngineError> {
        if !workflow.is_triggered_by(&event) {
            info!("Workflow '{}' not triggered by {}", workflow.name, event);
            return Ok(RunOutcome::Skipped(TriggerMismatch {
                workflow_name: workflow.name.clone(),
                event,
            }));
        }

        let mut run = Run::new(workflow, event);
        let run_id = run.state.run_id;
        let context = RunContext::new(
            run_id,
            workflow.name.clone(),
            run.event.clone(),
            workflow.variables.clone(),
        );
        let mut environment = Environment::create(context, &workflow.env, self.temp_root.as_deref())?;

        info!("Starting run {} of '{}' ({})", run_id, workflow.name, run.event);
        run.state.start(workflow.steps().len());
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            workflow_name: workflow.name.clone(),
            event: run.event.clone(),
            total_steps: workflow.steps().len(),
        });

        let mut hard_failure: Option<usize> = None;

        for step in workflow.steps() {
            let skip = if !step.enabled {
                Some(SkipReason::Disabled)
            } else if !step.guard.allows(hard_failure.is_some()) {
                Some(SkipReason::GuardNotMet)
            } else {
                None
            };

            if let Some(reason) = skip {
                debug!("Skipping step {} ({:?})", step.id, reason);
                run.steps[step.index].state = StepState::Skipped {
                    reason: reason.clone(),
                };
                self.emit_event(ExecutionEvent::StepSkipped {
                    run_id,
                    step_id: step.id.clone(),
                    reason,
                });
                continue;
            }

            let started_at = Utc::now();
            run.steps[step.index].state = StepState::Running { started_at };
            run.state.executed_steps += 1;
            self.emit_event(ExecutionEvent::StepStarted {
                run_id,
                index: step.index,
                step_id: step.id.clone(),
                step_name: step.name.clone(),
            });

            let result = self.executor.execute(workflow, step, &mut environment).await;

            let output = result.output().to_string();
            if !output.is_empty() {
                self.emit_event(ExecutionEvent::StepOutput {
                    run_id,
                    step_id: step.id.clone(),
                    output: output.clone(),
                });
            }
            run.steps[step.index].output = output;

            match result {
                ExecutionResult::Success { exit_code, .. } => {
                    run.steps[step.index].state = StepState::Succeeded {
                        exit_code,
                        started_at,
                        completed_at: Utc::now(),
                    };
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        run_id,
                        step_id: step.id.clone(),
                    });
                }
                ExecutionResult::Failed { error, exit_code, .. } => {
                    run.steps[step.index].state = StepState::Failed {
                        error: error.clone(),
                        exit_code,
                        best_effort: step.best_effort,
                        started_at,
                        failed_at: Utc::now(),
                    };
                    self.emit_event(ExecutionEvent::StepFailed {
                        run_id,
                        step_id: step.id.clone(),
                        error,
                        best_effort: step.best_effort,
                    });

                    if step.best_effort {
                        warn!("Best-effort step {} failed, continuing", step.id);
                    } else if hard_failure.is_none() {
                        error!("Step {} failed, no further steps will be launched", step.id);
                        hard_failure = Some(step.index);
                    }
                }
            }
        }

        match hard_failure {
            Some(index) => run.state.fail(index),
            None => run.state.succeed(),
        }

        info!("Run {} of '{}' finished: {:?}", run_id, workflow.name, run.status());
        self.emit_event(ExecutionEvent::RunCompleted {
            run_id,
            status: run.status(),
            failed_step: run.state.failed_step,
        });

        if let Err(e) = environment.close() {
            warn!("Run {}: {}", run_id, e);
        }

        Ok(RunOutcome::Finished(run))
    }

    /// Run one independent task per event; results keep the order of `events`
    pub async fn execute_all(
        self: &Arc<Self>,
        workflow: Arc<Workflow>,
        events: Vec<TriggerEvent>,
    ) -> Vec<Result<RunOutcome, EngineError>> {
        let mut tasks = JoinSet::new();
        for (position, event) in events.into_iter().enumerate() {
            let engine = Arc::clone(self);
            let workflow = Arc::clone(&workflow);
            tasks.spawn(async move { (position, engine.execute(&workflow, event).await) });
        }

        let mut results: Vec<(usize, Result<RunOutcome, EngineError>)> = Vec::with_capacity(tasks.len());
        let mut lost = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    error!("Run task panicked or was cancelled: {}", e);
                    lost += 1;
                    results.push((usize::MAX - lost, Err(EngineError::Join(e.to_string()))));
                }
            }
        }

        results.sort_by_key(|(position, _)| *position);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
