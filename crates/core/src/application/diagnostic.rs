// Diagnostic seam shared by Probe and LongProbe
use async_trait::async_trait;

use crate::domain::{Failure, Outcome};
use crate::port::ExecutionError;

/// A named, skippable diagnostic unit the scheduler can run
#[async_trait]
pub trait Diagnostic: Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable requirement reported when skipped
    fn requires(&self) -> Option<&str>;

    /// Human-readable message reported on success
    fn message(&self) -> &str;

    /// False for probes that must never run alongside others
    fn runs_in_parallel(&self) -> bool {
        true
    }

    /// Evaluate the probe-level skip check
    ///
    /// Must be idempotent: repeated calls with unchanged external state give
    /// the same answer.
    async fn should_skip(&self) -> Result<bool, ExecutionError>;

    /// Run every command and return the aggregated failure records
    async fn invoke(&self) -> Result<Vec<Failure>, ExecutionError>;

    /// Skip check followed by invocation
    async fn evaluate(&self) -> Result<Outcome, ExecutionError> {
        if self.should_skip().await? {
            return Ok(Outcome::Skipped {
                requires: self.requires().map(str::to_string),
            });
        }
        let failures = self.invoke().await?;
        Ok(Outcome::from_failures(failures, self.message()))
    }
}
