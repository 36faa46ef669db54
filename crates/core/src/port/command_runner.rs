// Command Runner Port
// Abstraction over shell command execution (foreground and background)

use async_trait::async_trait;
use thiserror::Error;

/// Captured output of a finished command
///
/// Output is already decoded to text; adapters decode lossily so that
/// classification never has to deal with invalid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Informational only. `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execution errors
///
/// A non-zero exit status is NOT an execution error; these variants mean the
/// OS could not run (or manage) the command at all.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed for `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Process kill failed: {0}")]
    Killed(String),
}

/// Command Runner trait
///
/// Implementations:
/// - ShellCommandRunner: `sh -c` via tokio::process (diagnose-infra-system)
/// - MockCommandRunner: scripted outputs for tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a shell command to completion and capture its output
    ///
    /// Spawns exactly one OS process per call.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Io if output cannot be collected
    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecutionError>;

    /// Launch a shell command in the background without waiting for it
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    async fn spawn(&self, command: &str) -> Result<Box<dyn BackgroundProcess>, ExecutionError>;
}

/// Handle to a running background process
#[async_trait]
pub trait BackgroundProcess: Send {
    /// The command line this process was started from
    fn command(&self) -> &str;

    /// Non-blocking status check; true once the process has exited
    fn try_finished(&mut self) -> Result<bool, ExecutionError>;

    /// Terminate the process (and its children)
    ///
    /// # Errors
    /// - ExecutionError::Killed if the process could not be signalled
    async fn kill(&mut self) -> Result<(), ExecutionError>;

    /// Wait for exit and return everything the process wrote
    async fn collect(&mut self) -> Result<CommandOutput, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted behaviour of a mock background process
    #[derive(Debug, Clone)]
    pub struct ProcessScript {
        /// Number of status checks that report "still running"
        pub iterations: usize,
        /// Output returned by `collect`
        pub output: CommandOutput,
        /// Make `kill` fail
        pub kill_fails: bool,
        /// Make `collect` never resolve, like a stressor that was not stopped
        pub collect_hangs: bool,
    }

    impl ProcessScript {
        pub fn new(iterations: usize, stdout: impl Into<String>) -> Self {
            Self {
                iterations,
                output: CommandOutput::new(stdout),
                kill_fails: false,
                collect_hangs: false,
            }
        }

        pub fn with_failing_kill(mut self) -> Self {
            self.kill_fails = true;
            self
        }

        pub fn with_hanging_collect(mut self) -> Self {
            self.collect_hangs = true;
            self
        }
    }

    /// Observable state of a mock background process
    #[derive(Debug, Default)]
    pub struct ProcessProbe {
        pub polls: AtomicUsize,
        pub killed: AtomicBool,
        pub collected: AtomicBool,
    }

    impl ProcessProbe {
        pub fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }

        pub fn killed(&self) -> bool {
            self.killed.load(Ordering::SeqCst)
        }

        pub fn collected(&self) -> bool {
            self.collected.load(Ordering::SeqCst)
        }
    }

    /// Mock background process: "runs" for a fixed number of polls
    pub struct MockProcess {
        command: String,
        script: ProcessScript,
        state: Arc<ProcessProbe>,
    }

    #[async_trait]
    impl BackgroundProcess for MockProcess {
        fn command(&self) -> &str {
            &self.command
        }

        fn try_finished(&mut self) -> Result<bool, ExecutionError> {
            if self.state.killed() {
                return Ok(true);
            }
            let polls = self.state.polls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(polls > self.script.iterations)
        }

        async fn kill(&mut self) -> Result<(), ExecutionError> {
            if self.script.kill_fails {
                return Err(ExecutionError::Killed("mock refused to die".to_string()));
            }
            self.state.killed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn collect(&mut self) -> Result<CommandOutput, ExecutionError> {
            if self.script.collect_hangs {
                std::future::pending::<()>().await;
            }
            self.state.collected.store(true, Ordering::SeqCst);
            Ok(self.script.output.clone())
        }
    }

    /// Mock Command Runner for testing
    ///
    /// Each command has a queue of responses; the last response repeats once
    /// the queue is drained. Unknown commands produce empty output.
    #[derive(Default)]
    pub struct MockCommandRunner {
        responses: Mutex<HashMap<String, VecDeque<Result<CommandOutput, String>>>>,
        processes: Mutex<HashMap<String, (ProcessScript, Arc<ProcessProbe>)>>,
        executed: Mutex<Vec<String>>,
    }

    impl MockCommandRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a stdout response for `command`
        pub fn respond(&self, command: impl Into<String>, stdout: impl Into<String>) -> &Self {
            self.respond_with(command, CommandOutput::new(stdout))
        }

        pub fn respond_with(&self, command: impl Into<String>, output: CommandOutput) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(command.into())
                .or_default()
                .push_back(Ok(output));
            self
        }

        /// Make `command` fail to spawn
        pub fn fail(&self, command: impl Into<String>, reason: impl Into<String>) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(command.into())
                .or_default()
                .push_back(Err(reason.into()));
            self
        }

        /// Register a background process for `command`, returning its observable state
        pub fn background(
            &self,
            command: impl Into<String>,
            script: ProcessScript,
        ) -> Arc<ProcessProbe> {
            let state = Arc::new(ProcessProbe::default());
            self.processes
                .lock()
                .unwrap()
                .insert(command.into(), (script, Arc::clone(&state)));
            state
        }

        /// Every command passed to `execute` or `spawn`, in call order
        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }

        pub fn call_count(&self, command: &str) -> usize {
            self.executed
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == command)
                .count()
        }
    }

    #[async_trait]
    impl CommandRunner for MockCommandRunner {
        async fn execute(&self, command: &str) -> Result<CommandOutput, ExecutionError> {
            self.executed.lock().unwrap().push(command.to_string());

            let mut responses = self.responses.lock().unwrap();
            let response = match responses.get_mut(command) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };

            match response {
                Some(Ok(output)) => Ok(output),
                Some(Err(reason)) => Err(ExecutionError::SpawnFailed {
                    command: command.to_string(),
                    reason,
                }),
                None => Ok(CommandOutput::new("")),
            }
        }

        async fn spawn(
            &self,
            command: &str,
        ) -> Result<Box<dyn BackgroundProcess>, ExecutionError> {
            self.executed.lock().unwrap().push(command.to_string());

            let processes = self.processes.lock().unwrap();
            match processes.get(command) {
                Some((script, state)) => Ok(Box::new(MockProcess {
                    command: command.to_string(),
                    script: script.clone(),
                    state: Arc::clone(state),
                })),
                None => Err(ExecutionError::SpawnFailed {
                    command: command.to_string(),
                    reason: "no background script registered".to_string(),
                }),
            }
        }
    }
}
