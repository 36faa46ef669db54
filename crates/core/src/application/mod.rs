// Application Layer - Probe execution engine

pub mod classifier;
pub mod devices;
pub mod diagnostic;
pub mod long_probe;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod worker;

// Re-exports
pub use classifier::PatternClassifier;
pub use devices::DeviceEnumerator;
pub use diagnostic::Diagnostic;
pub use long_probe::LongProbe;
pub use probe::Probe;
pub use registry::Registry;
pub use scheduler::{ProbeFault, ProbeReport, RunReport, Scheduler};
