//! Test: Disabled steps - never invoked, never resolve secrets

use crate::helpers::*;
use pipeline_runner::core::{SkipReason, StepState, TriggerEvent};
use pipeline_runner::secrets::InMemorySecretStore;
use std::sync::Arc;

const PUBLISH: &str = r#"
name: "Publish"
steps:
  - id: build
    name: Build
    run: make dist
  - id: publish
    name: Publish
    enabled: false
    run: twine upload -u ${{ secrets.USERNAME }} dist/*
    env:
      TWINE_PASSWORD: ${{ secrets.PASSWORD }}
  - id: notify
    name: Notify
    run: echo done
"#;

/// The disabled step is skipped and its secrets are never requested
#[tokio::test]
async fn test_disabled_step_does_not_resolve_secrets() {
    let workflow = workflow_from_yaml(PUBLISH);
    let runner = Arc::new(ScriptedRunner::new());
    let secrets = Arc::new(
        InMemorySecretStore::new()
            .with_secret("USERNAME", "__token__")
            .with_secret("PASSWORD", "hunter2"),
    );

    let run = run_with(&workflow, TriggerEvent::push("main"), runner.clone(), secrets.clone())
        .await
        .into_run()
        .unwrap();

    assert_run_succeeded(&run);
    assert_invocation_order(&runner, &["build", "notify"]);
    assert!(matches!(
        run.step("publish").unwrap().state,
        StepState::Skipped { reason: SkipReason::Disabled }
    ));
    assert!(secrets.lookups().await.is_empty());
}

/// Enabling the same step resolves exactly the secrets it references
#[tokio::test]
async fn test_enabled_step_resolves_its_secrets() {
    let workflow = workflow_from_yaml(&PUBLISH.replace("enabled: false", "enabled: true"));
    let runner = Arc::new(ScriptedRunner::new());
    let secrets = Arc::new(
        InMemorySecretStore::new()
            .with_secret("USERNAME", "__token__")
            .with_secret("PASSWORD", "hunter2")
            .with_secret("UNUSED", "never"),
    );

    let run = run_with(&workflow, TriggerEvent::push("main"), runner.clone(), secrets.clone())
        .await
        .into_run()
        .unwrap();

    assert_run_succeeded(&run);
    let mut lookups = secrets.lookups().await;
    lookups.sort();
    assert_eq!(lookups, vec!["PASSWORD", "USERNAME"]);

    let publish = runner
        .invocations()
        .into_iter()
        .find(|i| i.step_id == "publish")
        .unwrap();
    assert_eq!(publish.env.get("TWINE_PASSWORD").map(String::as_str), Some("hunter2"));
}

/// A missing secret fails the step that needs it, before anything is invoked
#[tokio::test]
async fn test_missing_secret_fails_step() {
    let workflow = workflow_from_yaml(&PUBLISH.replace("enabled: false", "enabled: true"));
    let runner = Arc::new(ScriptedRunner::new());
    let secrets = Arc::new(InMemorySecretStore::new().with_secret("USERNAME", "__token__"));

    let run = run_with(&workflow, TriggerEvent::push("main"), runner.clone(), secrets)
        .await
        .into_run()
        .unwrap();

    assert_run_failed_at(&run, "publish");
    assert_invocation_order(&runner, &["build"]);
    assert_step_skipped(&run, "notify");
    assert!(run.failure().unwrap().reason.contains("PASSWORD"));
}
