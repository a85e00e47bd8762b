use anyhow::{Context, Result};
use pipeline_runner::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use pipeline_runner::cli::output::*;
use pipeline_runner::cli::{Cli, Command};
use pipeline_runner::core::config::WorkflowConfig;
use pipeline_runner::core::RunOutcome;
use pipeline_runner::execution::{ExecutionEngine, ExecutionEvent};
use pipeline_runner::persistence::{
    create_summary, InMemoryPersistence, PersistenceBackend, RunStatus, RunSummary,
};
use pipeline_runner::runner::{ActionRegistry, WorkflowRunner};
use pipeline_runner::secrets::EnvSecretStore;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        pipeline_runner::persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<()> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow")?;
    let mut workflow = config.to_workflow()?;

    println!("{} Loaded workflow: {}", INFO, style(&workflow.name).bold());

    for (key, value) in &cmd.var {
        workflow = workflow.with_variable(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let runner_config = cmd.runner_config();
    let mut registry = ActionRegistry::with_builtins();
    registry.register_templates(workflow.actions.iter());
    let runner = WorkflowRunner::new(&runner_config, registry);
    let secrets = EnvSecretStore::new(runner_config.secret_prefix.clone());

    let progress = create_progress_bar(workflow.steps().len());
    let bar = progress.clone();
    let engine = ExecutionEngine::new(runner, secrets)
        .with_config(&runner_config)
        .with_event_handler(move |event| {
            match event {
                ExecutionEvent::StepOutput { output, .. } => {
                    if stream {
                        bar.println(format_output(output, 20));
                    }
                    return;
                }
                ExecutionEvent::StepSucceeded { .. }
                | ExecutionEvent::StepFailed { .. }
                | ExecutionEvent::StepSkipped { .. } => bar.inc(1),
                ExecutionEvent::StepStarted { step_name, .. } => bar.set_message(step_name.clone()),
                _ => {}
            }
            bar.println(format_execution_event(event));
        });

    let outcome = engine.execute(&workflow, cmd.trigger_event()).await?;
    progress.finish_and_clear();

    let run = match outcome {
        RunOutcome::Skipped(mismatch) => {
            println!("{} {}, nothing to do", WARN, mismatch);
            return Ok(());
        }
        RunOutcome::Finished(run) => run,
    };

    println!("\n{}", format_run_report(&run));

    if !cmd.no_history {
        let summary = create_summary(&run);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    if run.succeeded() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&workflow.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&workflow.name).bold(),
            style("failed").red()
        );
        if let Some(failure) = run.failure() {
            error!("{}", failure);
            if let Some(report) = run.steps.get(failure.step_index) {
                if !report.output.is_empty() {
                    println!("{}", format_output(&report.output, 40));
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        let workflow = config.to_workflow()?;
        Ok((config, workflow))
    });

    match result {
        Ok((config, workflow)) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&workflow.name).bold());
            println!(
                "  Steps: {} ({} enabled)",
                style(workflow.steps().len()).cyan(),
                style(workflow.enabled_steps().count()).cyan()
            );
            for rule in workflow.trigger.rules() {
                let branches = if rule.branches.is_empty() {
                    "any branch".to_string()
                } else {
                    rule.branches.join(", ")
                };
                println!("  Trigger: {} on {}", style(&rule.event_type).cyan(), branches);
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = open_history().await?;
    let workflows = store.list_workflows().await?;

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for name in &workflows {
            let runs = store.list_runs(name).await?;
            json_data.push(serde_json::json!({
                "name": name,
                "run_count": runs.len()
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    for name in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(name).await?;
            let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(name).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.workflow {
        Some(name) => store.list_runs(name).await?,
        None => {
            let mut all = Vec::new();
            for name in store.list_workflows().await? {
                all.extend(store.list_runs(&name).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, runs.len());
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Event: {} to {}", summary.event_type, summary.branch);
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Steps run: {}/{}",
        summary.executed_steps, summary.total_steps
    );
    if let Some(index) = summary.failed_step {
        println!("  Failed at step: {}", style(index + 1).red());
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
