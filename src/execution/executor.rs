//! Step executor - prepares and runs individual steps

use crate::{
    core::{expression, Step, StepAction, Workflow},
    environment::Environment,
    runner::{InvocationKind, StepInvocation, StepRunner},
    secrets::{self, Masker, SecretStore},
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Step exited successfully
    Success { exit_code: i32, output: String },
    /// Step exited unsuccessfully or could not be invoked
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
    },
}

impl ExecutionResult {
    pub fn output(&self) -> &str {
        match self {
            ExecutionResult::Success { output, .. } | ExecutionResult::Failed { output, .. } => output,
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R, S> {
    runner: R,
    secrets: S,
    default_timeout_secs: Option<u64>,
}

impl<R: StepRunner, S: SecretStore> StepExecutor<R, S> {
    pub fn new(runner: R, secrets: S) -> Self {
        Self {
            runner,
            secrets,
            default_timeout_secs: None,
        }
    }

    /// Timeout for steps when neither the step nor the workflow sets one
    pub fn with_default_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.default_timeout_secs = timeout_secs;
        self
    }

    /// Execute an enabled step inside the run's environment
    ///
    /// Secrets the step references are resolved here and nowhere else.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        step: &Step,
        environment: &mut Environment,
    ) -> ExecutionResult {
        info!("Executing step {} ({}): {}", step.index + 1, step.id, step.describe());

        let resolved = match secrets::resolve_all(&self.secrets, &step.secrets).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Secret resolution failed for step {}: {}", step.id, e);
                return ExecutionResult::Failed {
                    error: e.to_string(),
                    exit_code: None,
                    output: String::new(),
                };
            }
        };
        let masker = Masker::new(resolved.values());

        let invocation = self.prepare(workflow, step, environment, &resolved);
        let result = self.runner.run(&invocation).await;

        match environment.absorb_env_file() {
            Ok(keys) if !keys.is_empty() => debug!("Step {} exported {:?}", step.id, keys),
            Ok(_) => {}
            Err(e) => warn!("Step {}: {}", step.id, e),
        }

        match result {
            Ok(outcome) => {
                let output = masker.mask(&outcome.combined_output());
                if outcome.is_success() {
                    info!("Step {} succeeded", step.id);
                    ExecutionResult::Success {
                        exit_code: outcome.exit_code,
                        output,
                    }
                } else {
                    warn!("Step {} exited with code {}", step.id, outcome.exit_code);
                    ExecutionResult::Failed {
                        error: format!("exit code {}", outcome.exit_code),
                        exit_code: Some(outcome.exit_code),
                        output,
                    }
                }
            }
            Err(e) => {
                let error = masker.mask(&e.to_string());
                error!("Step {} could not be run: {}", step.id, error);
                ExecutionResult::Failed {
                    error,
                    exit_code: None,
                    output: String::new(),
                }
            }
        }
    }

    /// Render the step against the environment and resolved secrets
    fn prepare(
        &self,
        workflow: &Workflow,
        step: &Step,
        environment: &Environment,
        resolved: &HashMap<String, secrets::SecretValue>,
    ) -> StepInvocation {
        let secret_values: HashMap<String, String> = resolved
            .iter()
            .map(|(name, value)| (name.clone(), value.expose().to_string()))
            .collect();
        let run_env: HashMap<String, String> = environment
            .vars()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let scope = expression::Scope {
            secrets: Some(&secret_values),
            env: Some(&run_env),
            inputs: None,
            vars: Some(&environment.context().variables),
        };

        let mut env: BTreeMap<String, String> = environment.vars().clone();
        for (key, value) in &step.env {
            env.insert(key.clone(), expression::render(value, &scope));
        }

        let kind = match &step.action {
            StepAction::Run { command } => InvocationKind::Command(expression::render(command, &scope)),
            StepAction::Uses { action, with } => InvocationKind::Action {
                action: action.clone(),
                inputs: with
                    .iter()
                    .map(|(k, v)| (k.clone(), expression::render(v, &scope)))
                    .collect(),
            },
        };

        let timeout = workflow
            .timeout_for(step)
            .or(self.default_timeout_secs)
            .map(Duration::from_secs);

        StepInvocation {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            kind,
            env,
            workspace: environment.workspace().to_path_buf(),
            working_dir: environment.working_dir(step.working_directory.as_deref()),
            env_file: environment.env_file().to_path_buf(),
            timeout,
        }
    }
}
