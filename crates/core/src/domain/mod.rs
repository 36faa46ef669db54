// Domain Layer - Probe definitions, patterns, outcomes

pub mod definition;
pub mod error;
pub mod outcome;
pub mod pattern;

// Re-exports
pub use definition::{ProbeDefinition, Processor, SkipCheck, SkipPredicate};
pub use error::PatternError;
pub use outcome::{Failure, Outcome, Reason};
pub use pattern::{PatternGroup, PatternKind};
