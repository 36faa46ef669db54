// Pattern classification: skip / fail-on-output / pass / processor / fail
use std::panic::AssertUnwindSafe;

use crate::application::worker::constants::OUTPUT_EXCERPT_CHARS;
use crate::application::worker::{execute_guarded, PanicGuardResult};
use crate::domain::error::Result;
use crate::domain::{PatternGroup, PatternKind, ProbeDefinition, Processor, Reason};

/// Compiled classification rules of one probe
///
/// Built once at probe construction; `classify` never compiles anything.
#[derive(Clone)]
pub struct PatternClassifier {
    skip: PatternGroup,
    fail: PatternGroup,
    pass: PatternGroup,
    processor: Option<Processor>,
    fail_on_output: bool,
}

impl PatternClassifier {
    /// Compile the pattern groups of `definition`
    ///
    /// # Errors
    /// - PatternError::InvalidPattern for the first malformed pattern
    pub fn new(definition: &ProbeDefinition) -> Result<Self> {
        let name = &definition.name;
        Ok(Self {
            skip: PatternGroup::compile(name, PatternKind::Skip, &definition.skip_patterns)?,
            fail: PatternGroup::compile(name, PatternKind::Fail, &definition.fail_patterns)?,
            pass: PatternGroup::compile(name, PatternKind::Pass, &definition.pass_patterns)?,
            processor: definition.processor.clone(),
            fail_on_output: definition.fail_on_output,
        })
    }

    /// Classify one command's output into failure reasons
    ///
    /// A skip-pattern match bypasses everything else. The remaining checks
    /// accumulate: one output can fail for several independent reasons.
    pub fn classify(&self, output: &str) -> Vec<Reason> {
        if self.skip.any_match(output) {
            return Vec::new();
        }

        let mut reasons = Vec::new();

        if self.fail_on_output && !output.is_empty() {
            reasons.push(excerpt(output));
        }

        if !self.pass.is_empty() && !self.pass.any_match(output) {
            reasons.push(excerpt(output));
        }

        if let Some(processor) = &self.processor {
            match execute_guarded(AssertUnwindSafe(|| processor(output))) {
                PanicGuardResult::Success(found) => {
                    reasons.extend(found.into_iter().map(Reason::Text));
                }
                PanicGuardResult::Panicked(msg) => {
                    reasons.push(Reason::Text(format!("processor panicked: {}", msg)));
                }
            }
        }

        reasons.extend(self.fail.captures(output).into_iter().map(Reason::Captures));

        reasons
    }
}

/// Quoted first characters of `output`, marked as truncated
fn excerpt(output: &str) -> Reason {
    let head: String = output.chars().take(OUTPUT_EXCERPT_CHARS).collect();
    Reason::Text(format!("{:?}...", head))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(definition: ProbeDefinition) -> PatternClassifier {
        PatternClassifier::new(&definition).unwrap()
    }

    #[test]
    fn test_skip_pattern_wins_over_everything() {
        let c = classifier(
            ProbeDefinition::new("t", "cmd")
                .skip_patterns(["not supported"])
                .fail_patterns(["error"])
                .pass_patterns(["all good"])
                .fail_on_output()
                .processor(|_| vec!["always".to_string()]),
        );

        assert!(c.classify("error: device not supported").is_empty());
    }

    #[test]
    fn test_missing_pass_signature_fails() {
        let c = classifier(ProbeDefinition::new("t", "cmd").pass_patterns(["^-- No entries --$"]));

        assert!(c.classify("-- No entries --\n").is_empty());

        let reasons = c.classify("Jan 01 host kernel: disk error\n");
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("disk error"));
    }

    #[test]
    fn test_fail_on_output() {
        let c = classifier(ProbeDefinition::new("t", "cmd").fail_on_output());

        assert!(c.classify("").is_empty());
        assert_eq!(c.classify("unexpected").len(), 1);
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let c = classifier(ProbeDefinition::new("t", "cmd").fail_on_output());

        let reasons = c.classify(&"x".repeat(500));

        match &reasons[0] {
            Reason::Text(s) => {
                assert!(s.ends_with("..."));
                assert_eq!(s.len(), OUTPUT_EXCERPT_CHARS + 2 + 3);
            }
            other => panic!("unexpected reason {:?}", other),
        }
    }

    #[test]
    fn test_checks_accumulate() {
        let c = classifier(
            ProbeDefinition::new("t", "cmd")
                .pass_patterns(["healthy"])
                .processor(|_| vec!["custom".to_string()])
                .fail_patterns(["(DOWN)", "(lost)"]),
        );

        let reasons = c.classify("link DOWN, packets lost");

        assert_eq!(reasons.len(), 4);
        assert!(matches!(&reasons[1], Reason::Text(s) if s == "custom"));
        assert_eq!(reasons[2], Reason::Captures(vec!["DOWN".to_string()]));
        assert_eq!(reasons[3], Reason::Captures(vec!["lost".to_string()]));
    }

    #[test]
    fn test_processor_panic_becomes_reason() {
        let c = classifier(ProbeDefinition::new("t", "cmd").processor(|out| {
            let n: usize = out.trim().parse().expect("numeric output");
            vec![n.to_string()]
        }));

        let reasons = c.classify("garbage");

        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("processor panicked"));
    }

    #[test]
    fn test_no_rules_always_passes() {
        let c = classifier(ProbeDefinition::new("t", "cmd"));

        assert!(c.classify("anything at all").is_empty());
    }
}
