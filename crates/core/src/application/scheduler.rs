//! Scheduler - runs a selection of probes sequentially or in parallel
//!
//! - Skip checks are evaluated up front; skipped probes never run a command
//! - Parallel mode spawns one worker per probe and joins them in order
//! - Probes that refuse to run in parallel always run first, one at a time

use crate::application::diagnostic::Diagnostic;
use crate::application::registry::Registry;
use crate::application::worker::{dispatch, WorkerHandle, WorkerResult};
use crate::domain::Outcome;
use crate::error::ProbeError;
use crate::port::TimeProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Reported outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub elapsed_ms: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Worker-level fault of one probe
#[derive(Debug)]
pub struct ProbeFault {
    pub name: String,
    pub error: ProbeError,
}

/// Everything a scheduler run produced
#[derive(Debug, Default)]
pub struct RunReport {
    /// Resolved outcomes in reporting order
    pub reports: Vec<ProbeReport>,
    /// Probes whose worker faulted instead of producing an outcome
    pub faults: Vec<ProbeFault>,
}

impl RunReport {
    pub fn any_failed(&self) -> bool {
        self.reports.iter().any(|r| r.outcome.is_failed())
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ProbeReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

/// Scheduler over an explicitly constructed registry
pub struct Scheduler {
    registry: Arc<Registry>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Scheduler {
    pub fn new(registry: Arc<Registry>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            registry,
            time_provider,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the probes named in `names` (all when empty)
    ///
    /// Reporting order is declaration order, except that probes which refuse
    /// parallel execution are reported before the concurrently-run batch.
    ///
    /// # Errors
    /// - ProbeError::UnknownProbe if a name is not registered; nothing runs
    pub async fn run<S: AsRef<str>>(
        &self,
        names: &[S],
        force_sequential: bool,
    ) -> Result<RunReport, ProbeError> {
        let selected = self.registry.select(names)?;
        let mut report = RunReport::default();

        info!(
            probes = selected.len(),
            force_sequential = force_sequential,
            "Scheduler run starting"
        );

        // (rank, index) keeps declaration order within each reporting group
        let mut sequential = Vec::new();
        let mut concurrent = Vec::new();
        let mut resolved: Vec<((u8, usize), ProbeReport)> = Vec::new();

        for (index, diagnostic) in selected.into_iter().enumerate() {
            let skip = diagnostic.should_skip().await;
            match skip {
                Ok(true) => {
                    info!(probe = %diagnostic.name(), "Probe skipped");
                    resolved.push((
                        (1, index),
                        ProbeReport {
                            name: diagnostic.name().to_string(),
                            elapsed_ms: 0,
                            outcome: Outcome::Skipped {
                                requires: diagnostic.requires().map(str::to_string),
                            },
                        },
                    ));
                }
                Ok(false) if force_sequential || !diagnostic.runs_in_parallel() => {
                    let rank = if diagnostic.runs_in_parallel() { 1 } else { 0 };
                    sequential.push((rank, index, diagnostic));
                }
                Ok(false) => concurrent.push((index, diagnostic)),
                Err(e) => {
                    warn!(probe = %diagnostic.name(), error = %e, "Skip check failed");
                    report.faults.push(ProbeFault {
                        name: diagnostic.name().to_string(),
                        error: ProbeError::Execution(e),
                    });
                }
            }
        }

        // Sequential-only probes (and everything, when forced): one at a time
        sequential.sort_by_key(|(rank, index, _)| (*rank, *index));
        for (rank, index, diagnostic) in sequential {
            let result = self.dispatch(diagnostic).join().await;
            resolve(&mut report, &mut resolved, (rank, index), result);
        }

        // Everything else: one worker per probe, joined in declaration order
        let handles: Vec<_> = concurrent
            .into_iter()
            .map(|(index, diagnostic)| (index, self.dispatch(diagnostic)))
            .collect();
        for (index, handle) in handles {
            let result = handle.join().await;
            resolve(&mut report, &mut resolved, (1, index), result);
        }

        resolved.sort_by_key(|(key, _)| *key);
        report.reports = resolved.into_iter().map(|(_, r)| r).collect();

        info!(
            reported = report.reports.len(),
            faults = report.faults.len(),
            "Scheduler run finished"
        );

        Ok(report)
    }

    fn dispatch(&self, diagnostic: Arc<dyn Diagnostic>) -> WorkerHandle {
        dispatch(diagnostic, Arc::clone(&self.time_provider))
    }
}

/// Route a joined worker into either the ordered outcomes or the faults
fn resolve(
    report: &mut RunReport,
    resolved: &mut Vec<((u8, usize), ProbeReport)>,
    key: (u8, usize),
    result: WorkerResult,
) {
    match result.outcome {
        Ok(outcome) => resolved.push((
            key,
            ProbeReport {
                name: result.name,
                elapsed_ms: result.elapsed_ms,
                outcome,
            },
        )),
        Err(error) => report.faults.push(ProbeFault {
            name: result.name,
            error,
        }),
    }
}
