//! Test: Trigger filter - which events start a run

use crate::helpers::*;
use pipeline_runner::core::{EventType, TriggerEvent};
use pipeline_runner::execution::ExecutionEngine;
use pipeline_runner::persistence::{create_summary, InMemoryPersistence, PersistenceBackend};
use pipeline_runner::secrets::InMemorySecretStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DEFAULT_TRIGGER: &str = r#"
name: "Default trigger"
steps:
  - id: build
    name: Build
    run: make
"#;

/// Without an `on` section only pushes to main start a run
#[tokio::test]
async fn test_default_trigger_is_push_to_main() {
    let workflow = workflow_from_yaml(DEFAULT_TRIGGER);

    let ignored = [
        TriggerEvent::push("feature-x"),
        TriggerEvent::push("develop"),
        TriggerEvent::new(EventType::PullRequest, "main"),
        TriggerEvent::new(EventType::Tag, "main"),
        TriggerEvent::new(EventType::Manual, "main"),
    ];

    for event in ignored {
        let runner = Arc::new(ScriptedRunner::new());
        let outcome = run_with(
            &workflow,
            event.clone(),
            runner.clone(),
            Arc::new(InMemorySecretStore::new()),
        )
        .await;

        assert!(outcome.is_skipped(), "{} should not start a run", event);
        assert!(runner.invoked_ids().is_empty());
    }

    let runner = Arc::new(ScriptedRunner::new());
    let run = run_finished(&workflow, runner.clone()).await;
    assert_run_succeeded(&run);
    assert_invocation_order(&runner, &["build"]);
}

/// A skipped event emits no events and leaves nothing to record
#[tokio::test]
async fn test_mismatch_records_nothing() {
    let workflow = workflow_from_yaml(DEFAULT_TRIGGER);
    let events = Arc::new(AtomicUsize::new(0));
    let counter = events.clone();
    let engine = ExecutionEngine::new(ScriptedRunner::new(), InMemorySecretStore::new())
        .with_event_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let history = InMemoryPersistence::new();

    let outcome = engine
        .execute(&workflow, TriggerEvent::push("feature-x"))
        .await
        .unwrap();
    if let Some(run) = outcome.run() {
        history.save_run(&create_summary(run)).await.unwrap();
    }

    assert_eq!(events.load(Ordering::SeqCst), 0);
    assert!(history.list_workflows().await.unwrap().is_empty());
}

/// Custom `on` sections accept several event types and branch lists
#[tokio::test]
async fn test_custom_trigger_rules() {
    let workflow = workflow_from_yaml(
        r#"
name: "Custom trigger"
on:
  push:
  pull_request:
    branches: [main, release]
steps:
  - id: build
    name: Build
    run: make
"#,
    );

    assert!(workflow.is_triggered_by(&TriggerEvent::push("feature-x")));
    assert!(workflow.is_triggered_by(&TriggerEvent::new(EventType::PullRequest, "release")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::new(EventType::PullRequest, "feature-x")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::new(EventType::Tag, "main")));
}
