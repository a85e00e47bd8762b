//! Reusable actions referenced by `uses:`

use crate::core::{config::stays_in_workspace, expression, ActionRef};
use crate::runner::{shell::hide_inherited, RunnerError, StepOutcome};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Actions implemented by the runner itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    /// Copy the source tree into the workspace
    Checkout,
    /// Locate a Python interpreter of the requested version
    SetupPython,
}

/// How an action name is carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionHandler {
    Builtin(BuiltinAction),
    /// Shell command template rendered with `${{ inputs.X }}`
    Template(String),
}

/// Name -> handler table; versions in references are accepted as-is
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `actions/checkout` and `actions/setup-python`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("actions/checkout", ActionHandler::Builtin(BuiltinAction::Checkout));
        registry.register(
            "actions/setup-python",
            ActionHandler::Builtin(BuiltinAction::SetupPython),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, handler: ActionHandler) {
        self.actions.insert(name.into(), handler);
    }

    /// Register every `name -> template` pair
    pub fn register_templates<'a>(&mut self, templates: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (name, template) in templates {
            self.register(name.clone(), ActionHandler::Template(template.clone()));
        }
    }

    pub fn resolve(&self, action: &ActionRef) -> Result<&ActionHandler, RunnerError> {
        self.actions
            .get(&action.name)
            .ok_or_else(|| RunnerError::UnknownAction(action.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

/// Render an action template with the step's inputs and environment
pub fn render_template(
    template: &str,
    inputs: &BTreeMap<String, String>,
    env: &BTreeMap<String, String>,
) -> String {
    let inputs: HashMap<String, String> = inputs.clone().into_iter().collect();
    let env: HashMap<String, String> = env.clone().into_iter().collect();
    expression::render(
        template,
        &expression::Scope {
            inputs: Some(&inputs),
            env: Some(&env),
            ..Default::default()
        },
    )
}

/// Copy `source` into `workspace/<path input>`
pub async fn checkout(
    source: Option<&Path>,
    workspace: &Path,
    inputs: &BTreeMap<String, String>,
) -> Result<StepOutcome, RunnerError> {
    let source = source.ok_or_else(|| RunnerError::Action {
        action: "actions/checkout".to_string(),
        message: "no source directory configured".to_string(),
    })?;

    if !source.is_dir() {
        return Err(RunnerError::Action {
            action: "actions/checkout".to_string(),
            message: format!("source directory {} does not exist", source.display()),
        });
    }

    let target = match inputs.get("path") {
        Some(path) if !path.is_empty() => {
            if !stays_in_workspace(path) {
                return Err(RunnerError::Action {
                    action: "actions/checkout".to_string(),
                    message: format!("path must stay inside the workspace: {}", path),
                });
            }
            workspace.join(path)
        }
        _ => workspace.to_path_buf(),
    };

    let from = source.to_path_buf();
    let to = target.clone();
    let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
        .await
        .map_err(|e| RunnerError::Action {
            action: "actions/checkout".to_string(),
            message: format!("copy task failed: {}", e),
        })??;

    info!("Checked out {} files from {}", copied, source.display());
    Ok(StepOutcome::success(format!(
        "Copied {} files from {} to {}\n",
        copied,
        source.display(),
        target.display()
    )))
}

/// Recursively copy a directory tree, skipping VCS metadata. Returns the number of files copied.
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(from.to_path_buf(), to.to_path_buf())];

    while let Some((src_dir, dst_dir)) = pending.pop() {
        for entry in fs::read_dir(&src_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name == ".git" {
                continue;
            }
            let src = entry.path();
            let dst = dst_dir.join(&name);
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::create_dir_all(&dst)?;
                pending.push((src, dst));
            } else if file_type.is_file() {
                fs::copy(&src, &dst)?;
                copied += 1;
            } else {
                debug!("Skipping non-regular file {}", src.display());
            }
        }
    }

    Ok(copied)
}

/// Find an interpreter matching `python-version` and export it as `PYTHON`
pub async fn setup_python(
    inputs: &BTreeMap<String, String>,
    env: &BTreeMap<String, String>,
    env_file: Option<&Path>,
    hidden_prefix: &str,
) -> Result<StepOutcome, RunnerError> {
    let requested = inputs
        .get("python-version")
        .map(String::as_str)
        .unwrap_or("3");
    let major = requested.split('.').next().unwrap_or("3");

    let mut tried = Vec::new();
    for candidate in [format!("python{}", major), "python".to_string()] {
        let mut cmd = Command::new(&candidate);
        cmd.arg("--version");
        if !hidden_prefix.is_empty() {
            hide_inherited(&mut cmd, hidden_prefix, env);
        }
        let output = match cmd.envs(env).output().await {
            Ok(output) if output.status.success() => output,
            _ => {
                tried.push(format!("{}: not found", candidate));
                continue;
            }
        };

        // Python 2 prints its version on stderr
        let reported = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let actual = reported.trim().trim_start_matches("Python ").to_string();

        if version_matches(requested, &actual) {
            if let Some(path) = env_file {
                append_env(path, "PYTHON", &candidate)?;
            }
            return Ok(StepOutcome::success(format!(
                "Using Python {} ({})\n",
                actual, candidate
            )));
        }
        tried.push(format!("{}: {}", candidate, actual));
    }

    Ok(StepOutcome::new(
        1,
        "",
        format!(
            "No Python interpreter matching {} ({})\n",
            requested,
            tried.join(", ")
        ),
    ))
}

fn append_env(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{}={}", key, value)
}

/// Component-wise version match; `x` and `*` match anything
pub fn version_matches(requested: &str, actual: &str) -> bool {
    let actual: Vec<&str> = actual.split('.').collect();
    requested
        .split('.')
        .enumerate()
        .all(|(i, want)| match actual.get(i) {
            Some(have) => want == "x" || want == "*" || want == *have,
            None => want == "x" || want == "*",
        })
}
