//! Trigger events and the predicate that decides whether a run starts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event delivered to the runner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Push,
    PullRequest,
    Tag,
    Manual,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Push => "push",
            EventType::PullRequest => "pull_request",
            EventType::Tag => "tag",
            EventType::Manual => "manual",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventType::Push),
            "pull_request" | "pull-request" => Ok(EventType::PullRequest),
            "tag" => Ok(EventType::Tag),
            "manual" | "workflow_dispatch" => Ok(EventType::Manual),
            other => Err(format!("Unknown event type: {}", other)),
        }
    }
}

/// An incoming event record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_type: EventType,
    pub branch: String,
}

impl TriggerEvent {
    pub fn new(event_type: EventType, branch: impl Into<String>) -> Self {
        Self {
            event_type,
            branch: branch.into(),
        }
    }

    /// Shorthand for a push to `branch`
    pub fn push(branch: impl Into<String>) -> Self {
        Self::new(EventType::Push, branch)
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.event_type, self.branch)
    }
}

/// One accepted event type and the branches it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    pub event_type: EventType,
    /// Accepted branches; empty means any branch
    pub branches: Vec<String>,
}

impl TriggerRule {
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.event_type == event.event_type
            && (self.branches.is_empty() || self.branches.iter().any(|b| b == &event.branch))
    }
}

/// Predicate over incoming events: the run starts iff any rule matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    rules: Vec<TriggerRule>,
}

impl Trigger {
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    /// Push to a single branch
    pub fn push_to(branch: impl Into<String>) -> Self {
        Self::new(vec![TriggerRule {
            event_type: EventType::Push,
            branches: vec![branch.into()],
        }])
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn matches(&self, event: &TriggerEvent) -> bool {
        self.rules.iter().any(|rule| rule.matches(event))
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::push_to("main")
    }
}
