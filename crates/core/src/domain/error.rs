// Domain Error Types

use thiserror::Error;

use super::pattern::PatternKind;

/// Malformed probe definition, detected at construction time
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid {kind} pattern `{pattern}` in probe {probe}: {reason}")]
    InvalidPattern {
        probe: String,
        kind: PatternKind,
        pattern: String,
        reason: String,
    },

    #[error("Invalid probe definition {probe}: {reason}")]
    InvalidDefinition { probe: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PatternError>;
