//! Step runners: the boundary between the executor and external tools

pub mod actions;
pub mod config;
pub mod outcome;
pub mod shell;

use crate::core::ActionRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use actions::{ActionHandler, ActionRegistry, BuiltinAction};
pub use config::RunnerConfig;
pub use outcome::{RunnerError, StepOutcome};
pub use shell::ShellRunner;

/// What a step asks the runner to do, with every expression already rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationKind {
    Command(String),
    Action {
        action: ActionRef,
        inputs: BTreeMap<String, String>,
    },
}

/// A fully prepared step invocation
#[derive(Debug, Clone)]
pub struct StepInvocation {
    pub step_id: String,
    pub step_name: String,
    pub kind: InvocationKind,
    /// Complete environment for the process (run env + step env)
    pub env: BTreeMap<String, String>,
    /// The run's workspace root
    pub workspace: PathBuf,
    /// Where the command runs
    pub working_dir: PathBuf,
    /// File steps append `KEY=VALUE` lines to
    pub env_file: PathBuf,
    pub timeout: Option<Duration>,
}

/// Trait for step execution - allows for different implementations
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Invoke the command or action and report its exit status and output
    async fn run(&self, invocation: &StepInvocation) -> Result<StepOutcome, RunnerError>;
}

#[async_trait]
impl<R: StepRunner + ?Sized> StepRunner for Arc<R> {
    async fn run(&self, invocation: &StepInvocation) -> Result<StepOutcome, RunnerError> {
        (**self).run(invocation).await
    }
}

/// Production runner: shell for `run:` steps, registry for `uses:` steps
#[derive(Debug, Clone)]
pub struct WorkflowRunner {
    shell: ShellRunner,
    registry: ActionRegistry,
    source_dir: Option<PathBuf>,
    secret_prefix: String,
}

impl WorkflowRunner {
    /// Steps never inherit process variables carrying `config.secret_prefix`;
    /// secrets reach a step only through the references it declares.
    pub fn new(config: &RunnerConfig, registry: ActionRegistry) -> Self {
        Self {
            shell: ShellRunner::new(config.shell.clone()).with_hidden_prefix(config.secret_prefix.clone()),
            registry,
            source_dir: config.source_dir.clone(),
            secret_prefix: config.secret_prefix.clone(),
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    async fn run_action(
        &self,
        action: &ActionRef,
        inputs: &BTreeMap<String, String>,
        invocation: &StepInvocation,
    ) -> Result<StepOutcome, RunnerError> {
        let builtin = match self.registry.resolve(action)? {
            ActionHandler::Builtin(builtin) => *builtin,
            ActionHandler::Template(template) => {
                // The shell enforces the timeout itself, including on its children
                let command = actions::render_template(template, inputs, &invocation.env);
                return self
                    .shell
                    .run(&command, &invocation.working_dir, &invocation.env, invocation.timeout)
                    .await;
            }
        };

        let call = self.run_builtin(builtin, inputs, invocation);
        match invocation.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RunnerError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
    }

    async fn run_builtin(
        &self,
        builtin: BuiltinAction,
        inputs: &BTreeMap<String, String>,
        invocation: &StepInvocation,
    ) -> Result<StepOutcome, RunnerError> {
        match builtin {
            BuiltinAction::Checkout => {
                actions::checkout(self.source_dir.as_deref(), &invocation.workspace, inputs).await
            }
            BuiltinAction::SetupPython => {
                actions::setup_python(
                    inputs,
                    &invocation.env,
                    Some(&invocation.env_file),
                    &self.secret_prefix,
                )
                .await
            }
        }
    }
}

#[async_trait]
impl StepRunner for WorkflowRunner {
    async fn run(&self, invocation: &StepInvocation) -> Result<StepOutcome, RunnerError> {
        match &invocation.kind {
            InvocationKind::Command(command) => {
                self.shell
                    .run(command, &invocation.working_dir, &invocation.env, invocation.timeout)
                    .await
            }
            InvocationKind::Action { action, inputs } => {
                self.run_action(action, inputs, invocation).await
            }
        }
    }
}
