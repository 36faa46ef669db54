// Device enumeration: one command per device
use crate::application::worker::constants::DEVICE_PLACEHOLDER;
use crate::port::{CommandRunner, ExecutionError};
use tracing::debug;

/// Expands a command template over the devices listed by a source command
#[derive(Debug, Clone)]
pub struct DeviceEnumerator {
    template: String,
    source: Option<String>,
}

impl DeviceEnumerator {
    pub fn new(template: impl Into<String>, source: Option<String>) -> Self {
        Self {
            template: template.into(),
            source,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Substitute every non-empty, trimmed line of `listing` into the template
    pub fn expand(&self, listing: &str) -> Vec<String> {
        listing
            .split('\n')
            .map(str::trim)
            .filter(|device| !device.is_empty())
            .map(|device| self.template.replace(DEVICE_PLACEHOLDER, device))
            .collect()
    }

    /// Resolve the command list, running the device source if configured
    ///
    /// Without a device source this is exactly one command: the template.
    pub async fn commands(&self, runner: &dyn CommandRunner) -> Result<Vec<String>, ExecutionError> {
        let Some(source) = &self.source else {
            return Ok(vec![self.template.clone()]);
        };

        let listing = runner.execute(source).await?;
        let commands = self.expand(&listing.stdout);

        debug!(
            source = %source,
            devices = commands.len(),
            "Devices enumerated"
        );

        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::command_runner::mocks::MockCommandRunner;

    #[test]
    fn test_expand_drops_empty_lines() {
        let devices = DeviceEnumerator::new("smartctl -A {device}", None);

        let commands = devices.expand("sda\nsdb\n\n");

        assert_eq!(commands, vec!["smartctl -A sda", "smartctl -A sdb"]);
    }

    #[test]
    fn test_expand_trims_whitespace() {
        let devices = DeviceEnumerator::new("hdparm -I {device}", None);

        let commands = devices.expand("  /dev/sda \r\n\t\n /dev/sdb");

        assert_eq!(commands, vec!["hdparm -I /dev/sda", "hdparm -I /dev/sdb"]);
    }

    #[tokio::test]
    async fn test_no_source_yields_template() {
        let runner = MockCommandRunner::new();
        let devices = DeviceEnumerator::new("df -i", None);

        let commands = devices.commands(&runner).await.unwrap();

        assert_eq!(commands, vec!["df -i"]);
        assert!(runner.executed().is_empty());
    }

    #[tokio::test]
    async fn test_source_is_executed() {
        let runner = MockCommandRunner::new();
        runner.respond("ls /dev/sd*", "sda\nsdb\n\n");
        let devices = DeviceEnumerator::new("smartctl -A {device}", Some("ls /dev/sd*".into()));

        let commands = devices.commands(&runner).await.unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(runner.executed(), vec!["ls /dev/sd*"]);
    }
}
