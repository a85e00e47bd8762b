//! Test utilities shared by the scenario suites
#![allow(dead_code)]

use async_trait::async_trait;
use pipeline_runner::core::config::WorkflowConfig;
use pipeline_runner::core::{Run, RunOutcome, RunStatus, StepState, TriggerEvent, Workflow};
use pipeline_runner::execution::ExecutionEngine;
use pipeline_runner::runner::{InvocationKind, RunnerError, StepInvocation, StepOutcome, StepRunner};
use pipeline_runner::secrets::InMemorySecretStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock runner: records every invocation and answers with scripted exit codes
///
/// Output is the rendered command (or the action reference), so tests can
/// check what a step actually received.
#[derive(Default)]
pub struct ScriptedRunner {
    exit_codes: HashMap<String, i32>,
    invocations: Mutex<Vec<StepInvocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the step with this id exit with `code`
    pub fn failing(mut self, step_id: &str, code: i32) -> Self {
        self.exit_codes.insert(step_id.to_string(), code);
        self
    }

    pub fn invocations(&self) -> Vec<StepInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Step ids in the order they were invoked
    pub fn invoked_ids(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.step_id.clone())
            .collect()
    }

    pub fn was_invoked(&self, step_id: &str) -> bool {
        self.invoked_ids().iter().any(|id| id == step_id)
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn run(&self, invocation: &StepInvocation) -> Result<StepOutcome, RunnerError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let output = match &invocation.kind {
            InvocationKind::Command(command) => command.clone(),
            InvocationKind::Action { action, .. } => action.to_string(),
        };
        let code = self.exit_codes.get(&invocation.step_id).copied().unwrap_or(0);
        if code == 0 {
            Ok(StepOutcome::success(output))
        } else {
            Ok(StepOutcome::new(code, output, format!("{} failed", invocation.step_id)))
        }
    }
}

/// Parse a workflow from a YAML string
pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .expect("workflow YAML should be valid")
        .to_workflow()
        .expect("workflow should build")
}

/// Load one of the shipped demo workflows
pub fn demo_workflow(name: &str) -> Workflow {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name);
    WorkflowConfig::from_file(&path)
        .expect("demo workflow should load")
        .to_workflow()
        .expect("demo workflow should build")
}

/// Run a workflow against the scripted runner and a recording secret store
pub async fn run_with(
    workflow: &Workflow,
    event: TriggerEvent,
    runner: Arc<ScriptedRunner>,
    secrets: Arc<InMemorySecretStore>,
) -> RunOutcome {
    let engine = ExecutionEngine::new(runner, secrets);
    engine
        .execute(workflow, event)
        .await
        .expect("environment should be created")
}

/// Run with a fresh runner and no secrets; returns the finished run
pub async fn run_finished(workflow: &Workflow, runner: Arc<ScriptedRunner>) -> Run {
    run_with(
        workflow,
        TriggerEvent::push("main"),
        runner,
        Arc::new(InMemorySecretStore::new()),
    )
    .await
    .into_run()
    .expect("run should have started")
}

/// Assert the run succeeded
pub fn assert_run_succeeded(run: &Run) {
    assert_eq!(
        run.status(),
        RunStatus::Succeeded,
        "expected run to succeed, failure: {:?}",
        run.failure()
    );
}

/// Assert the run failed at the given step id
pub fn assert_run_failed_at(run: &Run, step_id: &str) {
    assert_eq!(run.status(), RunStatus::Failed, "expected run to fail");
    let failure = run.failure().expect("failed run should name a step");
    assert_eq!(failure.step_id, step_id);
}

/// Assert a step was never invoked and is recorded as skipped
pub fn assert_step_skipped(run: &Run, step_id: &str) {
    let report = run
        .step(step_id)
        .unwrap_or_else(|| panic!("no step '{}'", step_id));
    assert!(
        matches!(report.state, StepState::Skipped { .. }),
        "expected '{}' to be skipped, got {:?}",
        step_id,
        report.state
    );
}

/// Assert the steps were invoked in exactly this order
pub fn assert_invocation_order(runner: &ScriptedRunner, expected: &[&str]) {
    assert_eq!(runner.invoked_ids(), expected, "unexpected invocation order");
}
