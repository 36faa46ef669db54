// Central Error Type for the Application

use thiserror::Error;

use crate::port::ExecutionError;

/// Worker-level fault for a single probe
///
/// Surfaced by the scheduler next to (not instead of) the outcomes of the
/// other probes.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Probe worker panicked: {0}")]
    Panicked(String),

    #[error("Probe worker cancelled")]
    Cancelled,

    #[error("Unknown probe: {0}")]
    UnknownProbe(String),

    #[error("Duplicate probe name: {0}")]
    DuplicateProbe(String),
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Pattern error: {0}")]
    Pattern(#[from] crate::domain::PatternError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
