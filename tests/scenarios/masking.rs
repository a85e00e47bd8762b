//! Test: Secret masking in captured output

use crate::helpers::*;
use pipeline_runner::core::TriggerEvent;
use pipeline_runner::execution::{ExecutionEngine, ExecutionEvent};
use pipeline_runner::runner::{ActionRegistry, RunnerConfig, WorkflowRunner};
use pipeline_runner::secrets::{EnvSecretStore, InMemorySecretStore};
use std::sync::{Arc, Mutex};

/// Rendered secrets reach the runner but are masked in the report
#[tokio::test]
async fn test_secret_masked_in_step_output() {
    let workflow = workflow_from_yaml(
        r#"
name: "Deploy"
steps:
  - id: deploy
    name: Deploy
    run: deploy --token ${{ secrets.API_TOKEN }}
"#,
    );
    let runner = Arc::new(ScriptedRunner::new());
    let secrets = Arc::new(InMemorySecretStore::new().with_secret("API_TOKEN", "tok-123456"));

    let run = run_with(&workflow, TriggerEvent::push("main"), runner.clone(), secrets)
        .await
        .into_run()
        .unwrap();

    assert_run_succeeded(&run);
    assert_eq!(run.step("deploy").unwrap().output, "deploy --token ***");
    assert!(!run.combined_output().contains("tok-123456"));
    assert!(runner.invocations()[0]
        .env
        .values()
        .all(|v| !v.contains("tok-123456")));
}

/// Output of a real shell echoing the secret is masked, also in events
#[tokio::test]
async fn test_shell_echo_is_masked() {
    let workflow = workflow_from_yaml(
        r#"
name: "Leaky"
steps:
  - id: leak
    name: Leak
    run: |
      echo "user=$PUBLISH_USER"
      echo "token is $PUBLISH_TOKEN" >&2
      exit 1
    env:
      PUBLISH_USER: ${{ secrets.USERNAME }}
      PUBLISH_TOKEN: ${{ secrets.PASSWORD }}
"#,
    );

    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    let config = RunnerConfig::new();
    let engine = ExecutionEngine::new(
        WorkflowRunner::new(&config, ActionRegistry::with_builtins()),
        InMemorySecretStore::new()
            .with_secret("USERNAME", "alice")
            .with_secret("PASSWORD", "correct-horse-battery"),
    )
    .with_config(&config)
    .with_event_handler(move |event| {
        if let ExecutionEvent::StepOutput { output, .. } = event {
            sink.lock().unwrap().push(output.clone());
        }
    });

    let run = engine
        .execute(&workflow, TriggerEvent::push("main"))
        .await
        .unwrap()
        .into_run()
        .unwrap();

    assert_run_failed_at(&run, "leak");
    let output = &run.step("leak").unwrap().output;
    assert!(output.contains("user=***"), "output was: {}", output);
    assert!(output.contains("token is ***"), "output was: {}", output);
    assert!(!output.contains("correct-horse-battery"));

    let events = captured.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].contains("alice"));
}

/// Host secrets are only visible to steps that reference them
#[tokio::test]
async fn test_host_secrets_not_inherited_by_steps() {
    let prefix = "SCENARIO_HOST_SECRET_";
    std::env::set_var("SCENARIO_HOST_SECRET_PASSWORD", "hunter2-from-host");

    let workflow = workflow_from_yaml(
        r#"
name: "Inherit"
steps:
  - id: inspect
    name: Inspect environment
    run: env
  - id: direct
    name: Read prefixed variable
    run: echo "direct=${SCENARIO_HOST_SECRET_PASSWORD:-unset}"
  - id: granted
    name: Use granted secret
    run: echo "granted=$TOKEN"
    env:
      TOKEN: ${{ secrets.PASSWORD }}
  - id: upload
    name: Upload
    enabled: false
    run: echo "$TWINE_PASSWORD"
    env:
      TWINE_PASSWORD: ${{ secrets.PASSWORD }}
"#,
    );

    let config = RunnerConfig::new().with_secret_prefix(prefix);
    let engine = ExecutionEngine::new(
        WorkflowRunner::new(&config, ActionRegistry::with_builtins()),
        EnvSecretStore::new(prefix),
    )
    .with_config(&config);

    let run = engine
        .execute(&workflow, TriggerEvent::push("main"))
        .await
        .unwrap()
        .into_run()
        .unwrap();

    assert_run_succeeded(&run);
    let inspected = &run.step("inspect").unwrap().output;
    assert!(!inspected.contains("SCENARIO_HOST_SECRET_"), "output was: {}", inspected);
    assert!(run.step("direct").unwrap().output.contains("direct=unset"));
    assert!(run.step("granted").unwrap().output.contains("granted=***"));
    assert!(!run.combined_output().contains("hunter2-from-host"));
    assert_step_skipped(&run, "upload");
}
