// Port Layer - Interfaces for external dependencies

pub mod command_runner;
pub mod time_provider;

// Re-exports
pub use command_runner::{BackgroundProcess, CommandOutput, CommandRunner, ExecutionError};
pub use time_provider::TimeProvider;
