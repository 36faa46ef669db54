// Background shell process with concurrent output draining
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use diagnose_core::application::worker::constants::{
    GRACEFUL_KILL_TIMEOUT_MS, KILL_CHECK_INTERVAL,
};
use diagnose_core::port::{BackgroundProcess, CommandOutput, ExecutionError, TimeProvider};

use crate::shell_runner::build_output;

type Drain = JoinHandle<io::Result<Vec<u8>>>;

/// A running stressor
///
/// stdout/stderr are read on their own tasks from the start, so the process
/// never stalls on a full pipe while the poll loop is sleeping.
pub struct ShellProcess {
    command: String,
    child: Child,
    pid: Option<u32>,
    stdout: Option<Drain>,
    stderr: Option<Drain>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ShellProcess {
    pub(crate) fn new(
        command: impl Into<String>,
        mut child: Child,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        Self {
            command: command.into(),
            pid: child.id(),
            child,
            stdout,
            stderr,
            time_provider,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// SIGTERM the process group, then SIGKILL if it lingers
    #[cfg(unix)]
    async fn kill_graceful(&mut self) -> Result<(), ExecutionError> {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Ok(());
        };
        let pgid = Pid::from_raw(pid as i32);

        if self.try_finished()? {
            sweep_group(pgid);
            return Ok(());
        }

        // Step 1: Send SIGTERM for graceful shutdown
        info!(pid = %pid, "Sending SIGTERM to process group");
        killpg(pgid, Signal::SIGTERM)
            .map_err(|e| ExecutionError::Killed(format!("SIGTERM failed: {}", e)))?;

        // Step 2: Wait for the shell to exit
        let start_time = self.time_provider.now_millis();
        loop {
            self.time_provider.sleep(KILL_CHECK_INTERVAL).await;

            if self.try_finished()? {
                info!(pid = %pid, "Process exited after SIGTERM");
                sweep_group(pgid);
                return Ok(());
            }

            // Timeout: force kill with SIGKILL
            if self.time_provider.now_millis() - start_time > GRACEFUL_KILL_TIMEOUT_MS {
                warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
                killpg(pgid, Signal::SIGKILL)
                    .map_err(|e| ExecutionError::Killed(format!("SIGKILL failed: {}", e)))?;
                return Ok(());
            }
        }
    }

    #[cfg(not(unix))]
    async fn kill_graceful(&mut self) -> Result<(), ExecutionError> {
        info!(pid = ?self.pid, "Killing process");
        self.child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(e.to_string()))
    }
}

/// Best-effort SIGKILL for group members that outlived the shell
#[cfg(unix)]
fn sweep_group(pgid: nix::unistd::Pid) {
    use nix::sys::signal::{killpg, Signal};

    // ESRCH here just means the group is already gone
    let _ = killpg(pgid, Signal::SIGKILL);
}

fn drain<R>(reader: Option<R>) -> Option<Drain>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut reader| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            Ok(buf)
        })
    })
}

async fn join_drain(handle: Option<Drain>) -> Result<Vec<u8>, ExecutionError> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .await
            .map_err(|e| ExecutionError::Io(e.to_string()))?
            .map_err(|e| ExecutionError::Io(e.to_string())),
    }
}

#[async_trait]
impl BackgroundProcess for ShellProcess {
    fn command(&self) -> &str {
        &self.command
    }

    fn try_finished(&mut self) -> Result<bool, ExecutionError> {
        self.child
            .try_wait()
            .map(|status| status.is_some())
            .map_err(|e| ExecutionError::Io(e.to_string()))
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        self.kill_graceful().await
    }

    async fn collect(&mut self) -> Result<CommandOutput, ExecutionError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ExecutionError::Io(e.to_string()))?;
        let stdout = join_drain(self.stdout.take()).await?;
        let stderr = join_drain(self.stderr.take()).await?;

        info!(
            command = %self.command,
            exit_code = ?status.code(),
            stdout_bytes = stdout.len(),
            "Background process collected"
        );

        Ok(build_output(&stdout, &stderr, status))
    }
}

#[cfg(test)]
mod tests {
    use crate::ShellCommandRunner;
    use diagnose_core::port::time_provider::SystemTimeProvider;
    use diagnose_core::port::CommandRunner;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn runner() -> ShellCommandRunner {
        ShellCommandRunner::new(Arc::new(SystemTimeProvider))
    }

    #[tokio::test]
    async fn test_spawn_and_collect() {
        let mut process = runner().spawn("echo started; sleep 0.2; echo finished").await.unwrap();

        while !process.try_finished().unwrap() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let output = process.collect().await.unwrap();

        assert_eq!(output.stdout, "started\nfinished\n");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_kill_terminates_long_sleep() {
        let mut process = runner().spawn("sleep 30").await.unwrap();
        let started = Instant::now();

        assert!(!process.try_finished().unwrap());
        process.kill().await.unwrap();

        assert!(process.try_finished().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
        let output = process.collect().await.unwrap();
        assert_eq!(output.exit_code, None, "terminated by signal");
    }

    #[tokio::test]
    async fn test_kill_reaches_whole_process_group() {
        let mut process = runner()
            .spawn("sleep 30 & sleep 30 & wait")
            .await
            .unwrap();

        process.kill().await.unwrap();

        // Pipes close only once every group member is gone
        let output = tokio::time::timeout(Duration::from_secs(5), process.collect()).await;
        assert!(output.is_ok(), "orphaned children kept the pipes open");
    }

    #[tokio::test]
    async fn test_chatty_process_does_not_block() {
        let mut process = runner().spawn("head -c 1000000 /dev/zero | tr '\\0' 'x'").await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !process.try_finished().unwrap() {
            assert!(Instant::now() < deadline, "process stalled on a full pipe");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let output = process.collect().await.unwrap();

        assert_eq!(output.stdout.len(), 1_000_000);
    }

    #[tokio::test]
    async fn test_kill_after_exit_is_harmless() {
        let mut process = runner().spawn("true").await.unwrap();
        while !process.try_finished().unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio_test::assert_ok!(process.kill().await);
        tokio_test::assert_ok!(process.collect().await);
    }
}
