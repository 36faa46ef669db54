// diagnose Infrastructure - System Adapters
// Implements: CommandRunner, BackgroundProcess

pub mod shell_process;
pub mod shell_runner;

pub use shell_process::ShellProcess;
pub use shell_runner::ShellCommandRunner;
