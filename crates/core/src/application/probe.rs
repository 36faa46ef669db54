// Probe: one named, skippable diagnostic unit
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::classifier::PatternClassifier;
use crate::application::devices::DeviceEnumerator;
use crate::application::diagnostic::Diagnostic;
use crate::domain::error::Result;
use crate::domain::{Failure, ProbeDefinition, SkipCheck};
use crate::port::{CommandOutput, CommandRunner, ExecutionError};

/// A compiled probe bound to a command runner
pub struct Probe {
    name: String,
    requires: Option<String>,
    message: String,
    devices: DeviceEnumerator,
    classifier: PatternClassifier,
    skip: Option<SkipCheck>,
    since_start: bool,
    runner: Arc<dyn CommandRunner>,
}

impl Probe {
    /// Compile `definition` into a runnable probe
    ///
    /// # Errors
    /// - PatternError::InvalidPattern if any pattern fails to compile
    pub fn new(definition: ProbeDefinition, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let classifier = PatternClassifier::new(&definition)?;

        Ok(Self {
            devices: DeviceEnumerator::new(definition.command, definition.devices),
            name: definition.name,
            requires: definition.requires,
            message: definition.message,
            classifier,
            skip: definition.skip,
            since_start: definition.since_start,
            runner,
        })
    }

    pub fn command(&self) -> &str {
        self.devices.template()
    }

    pub fn skip_check(&self) -> Option<&SkipCheck> {
        self.skip.as_ref()
    }

    /// Only output produced after a long probe started is classified
    pub fn since_start(&self) -> bool {
        self.since_start
    }

    pub(crate) fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    pub(crate) fn devices(&self) -> &DeviceEnumerator {
        &self.devices
    }

    /// Classify one command's output into a failure record (None if it passed)
    pub fn classify(&self, command: &str, output: &str) -> Option<Failure> {
        let reasons = self.classifier.classify(output);
        if reasons.is_empty() {
            None
        } else {
            Some(Failure::new(command, reasons))
        }
    }

    /// Run every (device-expanded) command once, in order
    pub async fn outputs(&self) -> std::result::Result<Vec<(String, CommandOutput)>, ExecutionError> {
        let commands = self.devices.commands(self.runner.as_ref()).await?;
        let mut outputs = Vec::with_capacity(commands.len());

        for command in commands {
            let output = self.runner.execute(&command).await?;
            debug!(
                probe = %self.name,
                command = %command,
                exit_code = ?output.exit_code,
                "Probe command finished"
            );
            outputs.push((command, output));
        }

        Ok(outputs)
    }
}

#[async_trait]
impl Diagnostic for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Option<&str> {
        self.requires.as_deref()
    }

    fn message(&self) -> &str {
        &self.message
    }

    async fn should_skip(&self) -> std::result::Result<bool, ExecutionError> {
        let Some(skip) = &self.skip else {
            return Ok(false);
        };

        let output = self.runner.execute(skip.command()).await?;
        let skipped = skip.decide(&output.stdout);

        debug!(
            probe = %self.name,
            check = %skip.command(),
            skipped = skipped,
            "Skip check evaluated"
        );

        Ok(skipped)
    }

    async fn invoke(&self) -> std::result::Result<Vec<Failure>, ExecutionError> {
        let outputs = self.outputs().await?;
        let failures: Vec<Failure> = outputs
            .iter()
            .filter_map(|(command, output)| self.classify(command, &output.stdout))
            .collect();

        info!(
            probe = %self.name,
            commands = outputs.len(),
            failures = failures.len(),
            "Probe invoked"
        );

        Ok(failures)
    }
}
