//! Shell runner - executes step commands as subprocesses

use crate::runner::{RunnerError, StepOutcome};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Time a timed-out step gets between SIGTERM and SIGKILL
const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Runs command strings through a shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Shell program followed by its leading arguments
    shell: Vec<String>,

    /// Inherited variables starting with this prefix are not passed on
    hidden_prefix: Option<String>,
}

impl ShellRunner {
    /// Create a new shell runner
    ///
    /// # Arguments
    /// * `shell` - Program and arguments preceding the command, e.g. `["sh", "-e", "-c"]`.
    ///   Falls back to `sh -c` when empty.
    pub fn new(shell: Vec<String>) -> Self {
        let shell = if shell.is_empty() {
            vec!["sh".to_string(), "-c".to_string()]
        } else {
            shell
        };
        Self {
            shell,
            hidden_prefix: None,
        }
    }

    /// Keep inherited variables with this prefix (the secret store's) away from steps
    pub fn with_hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.hidden_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Get the shell program
    pub fn program(&self) -> &str {
        &self.shell[0]
    }

    /// Execute a command in `working_dir` with `env` added to the inherited environment
    ///
    /// The shell leads its own process group, so a timeout terminates
    /// everything it started. A non-zero exit is reported through
    /// [`StepOutcome::exit_code`], not as an error.
    ///
    /// # Errors
    /// Returns `RunnerError` if:
    /// - The shell cannot be spawned (including a missing working directory)
    /// - The command outlives `timeout_after`
    pub async fn run(
        &self,
        command: &str,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
        timeout_after: Option<Duration>,
    ) -> Result<StepOutcome, RunnerError> {
        debug!(
            "Spawning {} in {} (command length {})",
            self.program(),
            working_dir.display(),
            command.len()
        );

        let mut cmd = Command::new(self.program());
        cmd.args(&self.shell[1..])
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(prefix) = &self.hidden_prefix {
            hide_inherited(&mut cmd, prefix, env);
        }
        cmd.envs(env);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: self.program().to_string(),
            source,
        })?;

        let stdout_handle = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_handle = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match timeout_after {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("Command timed out after {:?}, terminating its process group", limit);
                    terminate_process_group(&mut child, GRACE_PERIOD).await;
                    stdout_handle.abort();
                    stderr_handle.abort();
                    return Err(RunnerError::Timeout(limit.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();
        let exit_code = status.code().unwrap_or(-1);

        if status.success() {
            debug!("Command returned {} bytes of output", stdout.len() + stderr.len());
        } else {
            warn!("Command exited with code {}", exit_code);
        }

        Ok(StepOutcome::new(exit_code, stdout, stderr))
    }
}

/// Remove inherited variables starting with `prefix` unless `keep` sets them explicitly
pub(crate) fn hide_inherited(cmd: &mut Command, prefix: &str, keep: &BTreeMap<String, String>) {
    for (key, _) in std::env::vars_os() {
        if let Some(name) = key.to_str() {
            if name.starts_with(prefix) && !keep.contains_key(name) {
                cmd.env_remove(&key);
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin + Send + 'static>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            warn!("Failed to read step output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM the group, give it `grace` to exit, then SIGKILL whatever is left
#[cfg(unix)]
async fn terminate_process_group(child: &mut Child, grace: Duration) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let pgid = Pid::from_raw(pid as i32);

    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("SIGTERM to process group {} failed: {}", pid, e),
    }

    let deadline = tokio::time::Instant::now() + grace;
    while tokio::time::Instant::now() < deadline {
        if child.try_wait().ok().flatten().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // The shell may be gone while members of its group survive
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("SIGKILL to process group {} failed: {}", pid, e),
    }

    let _ = child.wait().await;
}

#[cfg(not(unix))]
async fn terminate_process_group(child: &mut Child, _grace: Duration) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(vec!["sh".to_string(), "-e".to_string(), "-c".to_string()])
    }
}
