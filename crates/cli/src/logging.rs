//! Logging setup
//!
//! Logs go to stderr through a non-blocking writer so they never interleave
//! with the report on stdout.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::LogFormat;

const DEFAULT_FILTER: &str = "diagnose=warn";

/// Install the global subscriber; keep the guard alive until exit
pub fn init(format: LogFormat) -> Result<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(writer))
            .try_init()?,
    }

    Ok(guard)
}
