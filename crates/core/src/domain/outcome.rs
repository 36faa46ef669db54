// Probe outcomes and failure records

use serde::Serialize;

/// One reason a command was classified as failing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reason {
    /// Literal description (processor output, truncated output, kill errors)
    Text(String),
    /// Captured groups of a matched fail pattern
    Captures(Vec<String>),
}

impl Reason {
    pub fn text(s: impl Into<String>) -> Self {
        Reason::Text(s.into())
    }

    /// True if the reason mentions `needle` anywhere
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Reason::Text(s) => s.contains(needle),
            Reason::Captures(groups) => groups.iter().any(|g| g.contains(needle)),
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Text(s) => write!(f, "{}", s),
            Reason::Captures(groups) => {
                let quoted: Vec<String> = groups.iter().map(|g| format!("{:?}", g)).collect();
                write!(f, "({})", quoted.join(", "))
            }
        }
    }
}

/// Failure record: the command that failed and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub command: String,
    pub reasons: Vec<Reason>,
}

impl Failure {
    pub fn new(command: impl Into<String>, reasons: Vec<Reason>) -> Self {
        Self {
            command: command.into(),
            reasons,
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.reasons.iter().any(|r| r.contains(needle))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FAIL [{}]:", self.command)?;
        for reason in &self.reasons {
            write!(f, "\n  {}", reason)?;
        }
        Ok(())
    }
}

/// Execution result of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Skipped { requires: Option<String> },
    Passed { message: String },
    Failed { failures: Vec<Failure> },
}

impl Outcome {
    /// Zero failures means the probe passed
    pub fn from_failures(failures: Vec<Failure>, message: &str) -> Self {
        if failures.is_empty() {
            Outcome::Passed {
                message: message.to_string(),
            }
        } else {
            Outcome::Failed { failures }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            Outcome::Failed { failures } => failures,
            _ => &[],
        }
    }
}
