// diagnose Core - Probe execution engine & Ports
// NO process spawning here: adapters implement the ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, ProbeError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
