// LongProbe: background stressor monitored by checker probes
//
// `invoke` spawns every stressor up front, then drives each through
// Checking (loop) -> Killing (on checker failure) -> Collecting.
// A failed kill skips Collecting; the dropped handle reaps the process.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::diagnostic::Diagnostic;
use crate::application::probe::Probe;
use crate::domain::error::Result;
use crate::domain::{Failure, ProbeDefinition, Reason};
use crate::port::{BackgroundProcess, CommandRunner, ExecutionError, TimeProvider};

/// Monitoring phase of one background process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Checking,
    Killing,
    Collecting,
}

/// Last line each `since_start` checker command printed before the stressors started
type Baselines = HashMap<String, String>;

/// Output appended after `baseline`; everything when the baseline is gone
fn fresh_output<'a>(output: &'a str, baseline: Option<&str>) -> &'a str {
    match baseline.and_then(|line| output.rfind(line).map(|at| at + line.len())) {
        Some(end) => output[end..].trim_start_matches('\n'),
        None => output,
    }
}

/// A probe whose command runs in the background while checkers watch for
/// collateral damage
pub struct LongProbe {
    probe: Probe,
    checkers: Vec<Arc<Probe>>,
    poll_interval: Duration,
    parallel: bool,
    time_provider: Arc<dyn TimeProvider>,
}

impl LongProbe {
    /// Compile `definition`; checkers are already-built probes
    ///
    /// # Errors
    /// - PatternError::InvalidPattern if any pattern fails to compile
    pub fn new(
        definition: ProbeDefinition,
        runner: Arc<dyn CommandRunner>,
        time_provider: Arc<dyn TimeProvider>,
        checkers: Vec<Arc<Probe>>,
        poll_interval: Duration,
    ) -> Result<Self> {
        Ok(Self {
            probe: Probe::new(definition, runner)?,
            checkers,
            poll_interval,
            parallel: true,
            time_provider,
        })
    }

    /// Never run concurrently with other long probes
    pub fn sequential_only(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn checkers(&self) -> &[Arc<Probe>] {
        &self.checkers
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn command(&self) -> &str {
        self.probe.command()
    }

    /// Checkers whose own skip check does not fire
    async fn active_checkers(&self) -> std::result::Result<Vec<Arc<Probe>>, ExecutionError> {
        let mut active = Vec::with_capacity(self.checkers.len());
        for checker in &self.checkers {
            if checker.should_skip().await? {
                debug!(probe = %self.name(), checker = %checker.name(), "Checker skipped");
                continue;
            }
            active.push(Arc::clone(checker));
        }
        Ok(active)
    }

    /// Snapshot the output of `since_start` checkers
    async fn baselines(
        &self,
        checkers: &[Arc<Probe>],
    ) -> std::result::Result<Baselines, ExecutionError> {
        let mut baselines = Baselines::new();
        for checker in checkers.iter().filter(|c| c.since_start()) {
            for (command, output) in checker.outputs().await? {
                if let Some(last) = output.stdout.lines().rev().find(|l| !l.trim().is_empty()) {
                    baselines.insert(command, last.to_string());
                }
            }
        }
        Ok(baselines)
    }

    /// Run every checker once and collect their failures
    async fn run_checkers(
        &self,
        checkers: &[Arc<Probe>],
        baselines: &Baselines,
    ) -> std::result::Result<Vec<Failure>, ExecutionError> {
        let mut failures = Vec::new();
        for checker in checkers {
            for (command, output) in checker.outputs().await? {
                let text = if checker.since_start() {
                    fresh_output(&output.stdout, baselines.get(&command).map(String::as_str))
                } else {
                    output.stdout.as_str()
                };
                failures.extend(checker.classify(&command, text));
            }
        }
        Ok(failures)
    }

    /// Drive one background process to completion
    async fn monitor(
        &self,
        process: &mut dyn BackgroundProcess,
        checkers: &[Arc<Probe>],
        baselines: &Baselines,
    ) -> std::result::Result<Vec<Failure>, ExecutionError> {
        let mut failures = Vec::new();
        let mut phase = Phase::Checking;
        let mut rounds = 0usize;

        loop {
            match phase {
                Phase::Checking => {
                    if process.try_finished()? {
                        phase = Phase::Collecting;
                        continue;
                    }
                    rounds += 1;

                    let found = self.run_checkers(checkers, baselines).await?;
                    if !found.is_empty() {
                        warn!(
                            probe = %self.name(),
                            command = %process.command(),
                            round = rounds,
                            "Checker failed, killing stressor"
                        );
                        failures.extend(found);
                        phase = Phase::Killing;
                        continue;
                    }

                    self.time_provider.sleep(self.poll_interval).await;
                }
                Phase::Killing => {
                    if let Err(e) = process.kill().await {
                        warn!(probe = %self.name(), error = %e, "Failed to kill stressor");
                        failures.push(Failure::new(
                            process.command(),
                            vec![Reason::Text(format!("failed to kill process: {}", e))],
                        ));
                        // Still running: collecting would wait for a natural exit
                        return Ok(failures);
                    }
                    phase = Phase::Collecting;
                }
                Phase::Collecting => {
                    let output = process.collect().await?;
                    if let Some(failure) = self.probe.classify(process.command(), &output.stdout) {
                        failures.push(failure);
                    }
                    debug!(
                        probe = %self.name(),
                        command = %process.command(),
                        rounds = rounds,
                        exit_code = ?output.exit_code,
                        failures = failures.len(),
                        "Stressor collected"
                    );
                    return Ok(failures);
                }
            }
        }
    }

    /// Kill processes that will never be monitored
    async fn abandon(&self, processes: impl IntoIterator<Item = Box<dyn BackgroundProcess>>) {
        for mut process in processes {
            debug!(probe = %self.name(), command = %process.command(), "Abandoning stressor");
            if let Err(e) = process.kill().await {
                warn!(probe = %self.name(), error = %e, "Failed to kill abandoned stressor");
            }
        }
    }
}

#[async_trait]
impl Diagnostic for LongProbe {
    fn name(&self) -> &str {
        self.probe.name()
    }

    fn requires(&self) -> Option<&str> {
        self.probe.requires()
    }

    fn message(&self) -> &str {
        self.probe.message()
    }

    fn runs_in_parallel(&self) -> bool {
        self.parallel
    }

    async fn should_skip(&self) -> std::result::Result<bool, ExecutionError> {
        self.probe.should_skip().await
    }

    async fn invoke(&self) -> std::result::Result<Vec<Failure>, ExecutionError> {
        let checkers = self.active_checkers().await?;
        let baselines = self.baselines(&checkers).await?;
        let runner = self.probe.runner();
        let commands = self.probe.devices().commands(runner.as_ref()).await?;

        // Starting
        let mut processes = Vec::with_capacity(commands.len());
        for command in &commands {
            match runner.spawn(command).await {
                Ok(process) => processes.push(process),
                Err(e) => {
                    self.abandon(processes).await;
                    return Err(e);
                }
            }
        }

        info!(
            probe = %self.name(),
            processes = processes.len(),
            checkers = checkers.len(),
            "Stressors started"
        );

        let mut pending = processes.into_iter();
        while let Some(mut process) = pending.next() {
            let failures = match self.monitor(process.as_mut(), &checkers, &baselines).await {
                Ok(failures) => failures,
                Err(e) => {
                    self.abandon(std::iter::once(process).chain(pending).collect::<Vec<_>>()).await;
                    return Err(e);
                }
            };

            if !failures.is_empty() {
                self.abandon(pending).await;
                return Ok(failures);
            }
        }

        Ok(Vec::new())
    }
}
