//! Test: Best-effort steps - failures recorded but not fatal

use crate::helpers::*;
use pipeline_runner::core::StepState;
use std::sync::Arc;

const LINT_THEN_TEST: &str = r#"
name: "Lint then test"
steps:
  - id: lint
    name: Lint
    run: flake8 .
    continue-on-error: true
  - id: test
    name: Test
    run: pytest
  - id: report
    name: Report
    run: echo report
    if: failure()
"#;

/// A failing best-effort step does not fail the run
#[tokio::test]
async fn test_best_effort_failure_still_succeeds() {
    let workflow = workflow_from_yaml(LINT_THEN_TEST);
    let runner = Arc::new(ScriptedRunner::new().failing("lint", 1));

    let run = run_finished(&workflow, runner.clone()).await;

    assert_run_succeeded(&run);
    assert!(run.failure().is_none());
    assert_invocation_order(&runner, &["lint", "test"]);
    assert_step_skipped(&run, "report");

    match &run.step("lint").unwrap().state {
        StepState::Failed { best_effort, exit_code, .. } => {
            assert!(*best_effort);
            assert_eq!(*exit_code, Some(1));
        }
        other => panic!("expected recorded failure, got {:?}", other),
    }
}

/// A hard failure after a best-effort one still fails the run
#[tokio::test]
async fn test_hard_failure_after_best_effort() {
    let workflow = workflow_from_yaml(LINT_THEN_TEST);
    let runner = Arc::new(ScriptedRunner::new().failing("lint", 1).failing("test", 4));

    let run = run_finished(&workflow, runner.clone()).await;

    assert_run_failed_at(&run, "test");
    assert_eq!(run.failure().unwrap().exit_code, Some(4));
    assert_invocation_order(&runner, &["lint", "test", "report"]);
}
