//! Test: the shipped Python packaging workflow

use crate::helpers::*;
use pipeline_runner::core::{SkipReason, StepState, TriggerEvent};
use pipeline_runner::runner::InvocationKind;
use pipeline_runner::secrets::InMemorySecretStore;
use std::sync::Arc;

const WORKFLOW: &str = "python-package.yml";

/// Push to main with every enabled step succeeding
#[tokio::test]
async fn test_push_to_main_runs_six_steps() {
    let workflow = demo_workflow(WORKFLOW);
    let runner = Arc::new(ScriptedRunner::new());
    let secrets = Arc::new(InMemorySecretStore::new());

    let run = run_with(&workflow, TriggerEvent::push("main"), runner.clone(), secrets.clone())
        .await
        .into_run()
        .unwrap();

    assert_run_succeeded(&run);
    assert_eq!(run.state.executed_steps, 6);
    assert_invocation_order(
        &runner,
        &["checkout", "setup-python", "install-deps", "tests", "install-packaging", "build"],
    );

    // Upload is declared but disabled: never invoked, credentials never looked up
    assert!(matches!(
        run.step("upload").unwrap().state,
        StepState::Skipped { reason: SkipReason::Disabled }
    ));
    assert!(!runner.was_invoked("upload"));
    assert!(secrets.lookups().await.is_empty());
}

/// Push to a feature branch never starts a run
#[tokio::test]
async fn test_push_to_feature_branch_is_ignored() {
    let workflow = demo_workflow(WORKFLOW);
    let runner = Arc::new(ScriptedRunner::new());

    let outcome = run_with(
        &workflow,
        TriggerEvent::push("feature-x"),
        runner.clone(),
        Arc::new(InMemorySecretStore::new()),
    )
    .await;

    assert!(outcome.is_skipped());
    assert!(outcome.run().is_none());
    assert!(runner.invoked_ids().is_empty());
}

/// Failing test discovery stops the run before packaging
#[tokio::test]
async fn test_failing_tests_stop_packaging() {
    let workflow = demo_workflow(WORKFLOW);
    let runner = Arc::new(ScriptedRunner::new().failing("tests", 1));

    let run = run_finished(&workflow, runner.clone()).await;

    assert_run_failed_at(&run, "tests");
    assert_eq!(run.state.failed_step, Some(3));
    assert_eq!(run.state.executed_steps, 4);
    assert_invocation_order(&runner, &["checkout", "setup-python", "install-deps", "tests"]);

    for id in ["install-packaging", "build", "upload"] {
        assert_step_skipped(&run, id);
    }

    let failure = run.failure().unwrap();
    assert_eq!(failure.exit_code, Some(1));
    assert_eq!(failure.step_name, "Run tests");

    // Output is reported for every executed step, ending with the failing one
    let output = run.combined_output();
    assert!(output.contains("Checkout"));
    assert!(output.contains("-m unittest discover"));
    assert!(!output.contains("sdist"));
}

/// Every command goes through the interpreter chosen by setup-python
#[tokio::test]
async fn test_commands_use_selected_interpreter() {
    let workflow = demo_workflow(WORKFLOW);
    let runner = Arc::new(ScriptedRunner::new());

    run_finished(&workflow, runner.clone()).await;

    let commands: Vec<String> = runner
        .invocations()
        .into_iter()
        .filter_map(|invocation| match invocation.kind {
            InvocationKind::Command(command) => Some(command),
            _ => None,
        })
        .collect();
    assert_eq!(commands.len(), 4);

    for line in commands.iter().flat_map(|c| c.lines()).map(str::trim) {
        let program = line.split_whitespace().next().unwrap_or_default();
        assert!(
            !matches!(program, "python" | "python3" | "pip" | "twine"),
            "bare interpreter call: {}",
            line
        );
    }
    assert!(commands.iter().all(|c| c.contains("\"$PYTHON\"")));
}
