//! CLI output formatting

use crate::{
    core::{Run, RunStatus, SkipReason, StepState},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the steps of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        StepState::Failed { best_effort: true, .. } => style("FAILED (ignored)").yellow().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a history entry for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    let failed = summary
        .failed_step
        .map(|i| format!(" - failed at step {}", i + 1))
        .unwrap_or_default();

    format!(
        "{} {} - {} - {} ({} to {}) - {}/{} steps run{}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        summary.event_type,
        summary.branch,
        summary.executed_steps,
        summary.total_steps,
        failed
    )
}

/// One line per step of a finished run
pub fn format_run_report(run: &Run) -> String {
    run.steps
        .iter()
        .map(|step| {
            format!(
                "  {:>2}. {:<40} {}",
                step.index + 1,
                step.name,
                format_step_state(&step.state)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow_name,
            event,
            total_steps,
        } => format!(
            "{} Starting {} on {} ({}, {} steps)",
            ROCKET,
            style(workflow_name).bold(),
            style(event).cyan(),
            style(short_id(run_id)).dim(),
            total_steps
        ),
        ExecutionEvent::StepStarted {
            index, step_name, ..
        } => format!("{} [{}] {}", SPINNER, index + 1, style(step_name).cyan()),
        ExecutionEvent::StepOutput { step_id, output, .. } => {
            format!("{} Output from {}:\n{}", INFO, style(step_id).dim(), output)
        }
        ExecutionEvent::StepSucceeded { step_id, .. } => {
            format!("{} {}", CHECK, style(step_id).green())
        }
        ExecutionEvent::StepFailed {
            step_id,
            error,
            best_effort: true,
            ..
        } => format!(
            "{} {}: {} (continuing)",
            WARN,
            style(step_id).yellow(),
            style(error).dim()
        ),
        ExecutionEvent::StepFailed { step_id, error, .. } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id, reason, .. } => {
            let why = match reason {
                SkipReason::Disabled => "disabled",
                SkipReason::GuardNotMet => "condition not met",
            };
            format!("{} {} ({})", SKIP, style(step_id).dim(), why)
        }
        ExecutionEvent::RunCompleted {
            run_id,
            status,
            failed_step,
        } => {
            let detail = match failed_step {
                Some(index) => format!(" at step {}", index + 1),
                None => String::new(),
            };
            format!(
                "{} Run ({}) {}{}",
                INFO,
                style(short_id(run_id)).dim(),
                format_status(*status),
                detail
            )
        }
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
