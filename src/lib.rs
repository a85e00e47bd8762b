//! pipeline-runner - run CI workflows locally in ephemeral environments

pub mod cli;
pub mod core;
pub mod environment;
pub mod execution;
pub mod persistence;
pub mod runner;
pub mod secrets;

// Re-export commonly used types
pub use crate::core::config::WorkflowConfig;
pub use crate::core::{EventType, Run, RunOutcome, RunStatus, Step, StepState, TriggerEvent, Workflow};
pub use crate::environment::{Environment, EnvironmentError};
pub use crate::execution::{EngineError, ExecutionEngine, ExecutionEvent};
pub use crate::runner::{ActionRegistry, RunnerConfig, RunnerError, ShellRunner, StepRunner, WorkflowRunner};
pub use crate::secrets::{EnvSecretStore, InMemorySecretStore, SecretStore};
