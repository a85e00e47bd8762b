//! Test: Fail fast - a hard failure stops the run

use crate::helpers::*;
use pipeline_runner::core::{StepState, TriggerEvent};
use pipeline_runner::execution::ExecutionEngine;
use pipeline_runner::runner::{ActionRegistry, RunnerConfig, WorkflowRunner};
use pipeline_runner::secrets::InMemorySecretStore;
use std::sync::Arc;

const FIVE_STEPS: &str = r#"
name: "Five steps"
steps:
  - { id: s1, name: One, run: "echo 1" }
  - { id: s2, name: Two, run: "echo 2" }
  - { id: s3, name: Three, run: "echo 3" }
  - { id: s4, name: Four, run: "echo 4" }
  - { id: s5, name: Five, run: "echo 5" }
"#;

/// Whichever step fails, nothing after it is invoked
#[tokio::test]
async fn test_no_step_after_failure_is_invoked() {
    let workflow = workflow_from_yaml(FIVE_STEPS);
    let ids = ["s1", "s2", "s3", "s4", "s5"];

    for (failing, id) in ids.iter().enumerate() {
        let runner = Arc::new(ScriptedRunner::new().failing(id, 2));
        let run = run_finished(&workflow, runner.clone()).await;

        assert_run_failed_at(&run, id);
        assert_invocation_order(&runner, &ids[..=failing]);
        for later in &ids[failing + 1..] {
            assert_step_skipped(&run, later);
        }
    }
}

/// `always()` and `failure()` steps still run after a hard failure
#[tokio::test]
async fn test_cleanup_steps_run_after_failure() {
    let workflow = workflow_from_yaml(
        r#"
name: "Cleanup"
steps:
  - { id: build, name: Build, run: make }
  - { id: package, name: Package, run: make dist }
  - { id: report, name: Report, run: "echo report", if: "failure()" }
  - { id: cleanup, name: Cleanup, run: "rm -rf build", if: "${{ always() }}" }
"#,
    );

    let runner = Arc::new(ScriptedRunner::new().failing("build", 1));
    let run = run_finished(&workflow, runner.clone()).await;

    assert_run_failed_at(&run, "build");
    assert_invocation_order(&runner, &["build", "report", "cleanup"]);

    // A failing cleanup step does not replace the first failure
    let runner = Arc::new(ScriptedRunner::new().failing("build", 1).failing("cleanup", 3));
    let run = run_finished(&workflow, runner).await;
    assert_run_failed_at(&run, "build");
}

/// `failure()` steps are skipped when nothing failed
#[tokio::test]
async fn test_failure_guard_skipped_on_success() {
    let workflow = workflow_from_yaml(
        r#"
name: "Report"
steps:
  - { id: build, name: Build, run: make }
  - { id: report, name: Report, run: "echo report", if: "failure()" }
"#,
    );

    let runner = Arc::new(ScriptedRunner::new());
    let run = run_finished(&workflow, runner.clone()).await;

    assert_run_succeeded(&run);
    assert_invocation_order(&runner, &["build"]);
    assert_step_skipped(&run, "report");
}

/// A step whose action cannot be resolved fails like a non-zero exit
#[tokio::test]
async fn test_unknown_action_fails_step() {
    let workflow = workflow_from_yaml(
        r#"
name: "Unknown action"
steps:
  - id: lint
    name: Lint
    uses: local/missing@v1
  - id: build
    name: Build
    run: "true"
"#,
    );

    let config = RunnerConfig::new();
    let engine = ExecutionEngine::new(
        WorkflowRunner::new(&config, ActionRegistry::with_builtins()),
        InMemorySecretStore::new(),
    )
    .with_config(&config);

    let run = engine
        .execute(&workflow, TriggerEvent::push("main"))
        .await
        .unwrap()
        .into_run()
        .unwrap();

    assert_run_failed_at(&run, "lint");
    match &run.step("lint").unwrap().state {
        StepState::Failed { error, exit_code, .. } => {
            assert!(error.contains("local/missing@v1"), "unexpected error: {}", error);
            assert_eq!(*exit_code, None);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_step_skipped(&run, "build");
}
