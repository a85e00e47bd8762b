//! Scenario-based tests for the workflow runner

mod best_effort;
mod disabled_steps;
mod fail_fast;
mod masking;
mod python_package;
mod trigger_filter;
