// Worker - one spawned task per probe

pub mod constants;
mod panic_guard;

pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};

use crate::application::diagnostic::Diagnostic;
use crate::domain::Outcome;
use crate::error::ProbeError;
use crate::port::{ExecutionError, TimeProvider};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Result of a joined worker
#[derive(Debug)]
pub struct WorkerResult {
    pub name: String,
    pub elapsed_ms: i64,
    pub outcome: Result<Outcome, ProbeError>,
}

/// Handle to a dispatched probe worker
///
/// Join is the only synchronization point: a panic or execution error inside
/// the worker is surfaced as a typed `ProbeError` on join.
pub struct WorkerHandle {
    name: String,
    started_ms: i64,
    time_provider: Arc<dyn TimeProvider>,
    handle: JoinHandle<Result<Outcome, ExecutionError>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the worker and convert its fate into a WorkerResult
    pub async fn join(self) -> WorkerResult {
        let outcome = match self.handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                error!(probe = %self.name, error = %e, "Probe execution failed");
                Err(ProbeError::Execution(e))
            }
            Err(join_err) if join_err.is_panic() => {
                let msg = panic_message(join_err.into_panic());
                error!(probe = %self.name, panic_msg = %msg, "Probe worker panicked");
                Err(ProbeError::Panicked(msg))
            }
            Err(_) => Err(ProbeError::Cancelled),
        };

        let elapsed_ms = self.time_provider.now_millis() - self.started_ms;
        info!(
            probe = %self.name,
            elapsed_ms = %elapsed_ms,
            ok = outcome.is_ok(),
            "Probe worker joined"
        );

        WorkerResult {
            name: self.name,
            elapsed_ms,
            outcome,
        }
    }
}

/// Spawn a worker task that invokes `diagnostic`
///
/// The worker does not re-check `skip`; the scheduler has already done so.
pub fn dispatch(
    diagnostic: Arc<dyn Diagnostic>,
    time_provider: Arc<dyn TimeProvider>,
) -> WorkerHandle {
    let name = diagnostic.name().to_string();
    let started_ms = time_provider.now_millis();

    info!(probe = %name, "Dispatching probe worker");

    let handle = tokio::task::spawn(async move {
        let failures = diagnostic.invoke().await?;
        Ok(Outcome::from_failures(failures, diagnostic.message()))
    });

    WorkerHandle {
        name,
        started_ms,
        time_provider,
        handle,
    }
}
