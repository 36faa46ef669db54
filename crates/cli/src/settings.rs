//! Runtime settings: defaults, then an optional TOML file, then `DIAGNOSE_*`
//! environment variables

use config::{Config, ConfigError, Environment, File, FileFormat};
use diagnose_core::application::worker::constants::DEFAULT_POLL_INTERVAL;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/diagnose/config.toml";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = DEFAULT_POLL_INTERVAL.as_millis() as u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// How often long probes run their checkers
    pub poll_interval_ms: u64,
    /// Run every probe one at a time
    pub sequential: bool,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            sequential: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load settings, reading `path` (tilde-expanded) or the default config file
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = shellexpand::tilde(path.unwrap_or(DEFAULT_CONFIG_PATH)).into_owned();

        Config::builder()
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("sequential", false)?
            .set_default("log_format", "pretty")?
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("DIAGNOSE").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
