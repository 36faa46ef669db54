// Shell command runner (sh -c via tokio::process)
// reason: tokio for async process management, never raising on exit status
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use diagnose_core::port::{
    BackgroundProcess, CommandOutput, CommandRunner, ExecutionError, TimeProvider,
};

use crate::shell_process::ShellProcess;

/// Default interpreter for probe commands
pub const DEFAULT_SHELL: &str = "sh";

/// Runs probe commands through a POSIX shell
///
/// Pipelines, redirections and `&&` chains in probe definitions rely on it.
pub struct ShellCommandRunner {
    time_provider: Arc<dyn TimeProvider>,
    shell: String,
}

impl ShellCommandRunner {
    /// Create a new shell runner
    ///
    /// # Example
    /// ```ignore
    /// let runner = ShellCommandRunner::new(Arc::new(SystemTimeProvider));
    /// let output = runner.execute("df -i").await?;
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_shell(time_provider, DEFAULT_SHELL)
    }

    pub fn with_shell(time_provider: Arc<dyn TimeProvider>, shell: impl Into<String>) -> Self {
        Self {
            time_provider,
            shell: shell.into(),
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn spawn_failed(command: &str, e: std::io::Error) -> ExecutionError {
        ExecutionError::SpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Decode process output lossily; exit status is informational only
pub(crate) fn build_output(
    stdout: &[u8],
    stderr: &[u8],
    status: std::process::ExitStatus,
) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(stdout).into_owned(),
        stderr: String::from_utf8_lossy(stderr).into_owned(),
        exit_code: status.code(),
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        debug!(command = %command, "Starting command execution");

        let child = self
            .command(command)
            .spawn()
            .map_err(|e| Self::spawn_failed(command, e))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecutionError::Io(e.to_string()))?;

        let result = build_output(&output.stdout, &output.stderr, output.status);
        let duration_ms = self.time_provider.now_millis() - start_time;

        info!(
            command = %command,
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            stdout_bytes = output.stdout.len(),
            "Command execution completed"
        );

        Ok(result)
    }

    async fn spawn(&self, command: &str) -> Result<Box<dyn BackgroundProcess>, ExecutionError> {
        let mut cmd = self.command(command);
        // Own process group, so a kill reaches everything the shell started
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| Self::spawn_failed(command, e))?;

        info!(command = %command, pid = ?child.id(), "Background process started");

        Ok(Box::new(ShellProcess::new(
            command,
            child,
            Arc::clone(&self.time_provider),
        )))
    }
}
