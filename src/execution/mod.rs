//! Workflow execution engine

pub mod engine;
pub mod executor;

pub use engine::{EngineError, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionResult, StepExecutor};
