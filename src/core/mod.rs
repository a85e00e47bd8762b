//! Core domain models for workflows
//!
//! This module defines the data structures that represent workflows,
//! steps, triggers, and the record of a run.

pub mod config;
pub mod context;
pub mod expression;
pub mod run;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use run::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
pub use workflow::*;
