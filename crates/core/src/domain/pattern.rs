// Pattern groups: compiled once, matched many times

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::error::{PatternError, Result};

/// Classification purpose of a pattern group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Skip,
    Fail,
    Pass,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Skip => write!(f, "skip"),
            PatternKind::Fail => write!(f, "fail"),
            PatternKind::Pass => write!(f, "pass"),
        }
    }
}

/// Ordered set of compiled matchers serving one classification purpose
///
/// Every matcher carries at least one capture group: patterns written
/// without one are wrapped in `(...)` before compilation.
#[derive(Debug, Clone)]
pub struct PatternGroup {
    kind: PatternKind,
    matchers: Vec<Regex>,
}

impl PatternGroup {
    /// Compile raw pattern strings for `probe`
    ///
    /// # Errors
    /// - PatternError::InvalidPattern on the first pattern that fails to compile
    pub fn compile<S: AsRef<str>>(probe: &str, kind: PatternKind, patterns: &[S]) -> Result<Self> {
        let matchers = patterns
            .iter()
            .map(|p| compile_with_capture(probe, kind, p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { kind, matchers })
    }

    pub fn empty(kind: PatternKind) -> Self {
        Self {
            kind,
            matchers: Vec::new(),
        }
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// True if any matcher finds a match in `text`
    pub fn any_match(&self, text: &str) -> bool {
        self.matchers.iter().any(|re| re.is_match(text))
    }

    /// Captured groups of every match, pattern by pattern
    ///
    /// Groups that did not participate in a match are returned as empty strings.
    pub fn captures(&self, text: &str) -> Vec<Vec<String>> {
        self.matchers
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

fn build(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
}

fn compile_with_capture(probe: &str, kind: PatternKind, pattern: &str) -> Result<Regex> {
    let invalid = |e: regex::Error| PatternError::InvalidPattern {
        probe: probe.to_string(),
        kind,
        pattern: pattern.to_string(),
        reason: e.to_string(),
    };

    let re = build(pattern).map_err(invalid)?;
    // captures_len counts the implicit whole-match group
    if re.captures_len() > 1 {
        return Ok(re);
    }
    build(&format!("({pattern})")).map_err(invalid)
}
