//! CLI command definitions

use crate::core::{EventType, TriggerEvent};
use crate::runner::RunnerConfig;
use clap::Args;
use std::path::{Path, PathBuf};

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Event type to simulate (push, pull_request, tag, manual)
    #[arg(long, default_value = "push")]
    pub event: EventType,

    /// Branch the event refers to
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Source tree copied by actions/checkout (defaults to the enclosing repository root)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Variable overrides exposed as vars.<key> (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Timeout in seconds for steps that don't set one
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Prefix of environment variables that hold secrets
    #[arg(long)]
    pub secret_prefix: Option<String>,

    /// Directory to create run environments in
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,
}

impl RunCommand {
    /// The event this invocation presents to the workflow
    pub fn trigger_event(&self) -> TriggerEvent {
        TriggerEvent::new(self.event.clone(), self.branch.clone())
    }

    /// Runner configuration derived from the flags
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new();

        let source = self
            .source
            .clone()
            .unwrap_or_else(|| find_source_root(Path::new(&self.file)));
        config = config.with_source_dir(source);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(prefix) = &self.secret_prefix {
            config = config.with_secret_prefix(prefix.clone());
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_root(dir.clone());
        }
        config
    }
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List workflows with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Repository root enclosing a workflow file: the nearest ancestor holding
/// `.git`, or the current directory when there is none
pub fn find_source_root(workflow_file: &Path) -> PathBuf {
    let parent = match workflow_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let start = parent.canonicalize().unwrap_or(parent);

    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
