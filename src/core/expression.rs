//! `${{ namespace.key }}` expressions used in commands, env values and action inputs

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Namespaces an expression may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Named credentials, resolved from the secret store
    Secrets,
    /// Run environment variables
    Env,
    /// Parameters passed to an action via `with:`
    Inputs,
    /// Workflow-level variables (`--var key=value`)
    Vars,
}

impl Namespace {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "secrets" => Some(Namespace::Secrets),
            "env" => Some(Namespace::Env),
            "inputs" => Some(Namespace::Inputs),
            "vars" => Some(Namespace::Vars),
            _ => None,
        }
    }
}

/// A single `${{ namespace.key }}` occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub namespace: Namespace,
    pub key: String,
}

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z0-9_\-]+)\s*\}\}")
            .expect("expression regex is valid")
    })
}

/// Collect all references in `text`, rejecting unknown namespaces
pub fn references(text: &str) -> Result<Vec<Reference>, String> {
    expression_regex()
        .captures_iter(text)
        .map(|caps| {
            let ns = &caps[1];
            let namespace = Namespace::parse(ns)
                .ok_or_else(|| format!("Unknown expression namespace '{}' in '{}'", ns, &caps[0]))?;
            Ok(Reference {
                namespace,
                key: caps[2].to_string(),
            })
        })
        .collect()
}

/// Names of all secrets referenced in `text`, ignoring malformed expressions
pub fn secret_names(text: &str) -> Vec<String> {
    expression_regex()
        .captures_iter(text)
        .filter(|caps| &caps[1] == "secrets")
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Values available while rendering one step
#[derive(Debug, Default, Clone)]
pub struct Scope<'a> {
    pub secrets: Option<&'a HashMap<String, String>>,
    pub env: Option<&'a HashMap<String, String>>,
    pub inputs: Option<&'a HashMap<String, String>>,
    pub vars: Option<&'a HashMap<String, String>>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, namespace: Namespace, key: &str) -> Option<&'a String> {
        let map = match namespace {
            Namespace::Secrets => self.secrets,
            Namespace::Env => self.env,
            Namespace::Inputs => self.inputs,
            Namespace::Vars => self.vars,
        };
        map.and_then(|m| m.get(key))
    }
}

/// Replace every expression in `text`; unresolved references render as the empty string
pub fn render(text: &str, scope: &Scope<'_>) -> String {
    expression_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            Namespace::parse(&caps[1])
                .and_then(|ns| scope.lookup(ns, &caps[2]))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}
