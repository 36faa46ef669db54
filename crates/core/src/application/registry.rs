// Probe registry: ordered name -> diagnostic mapping, built once at startup
use std::sync::Arc;

use crate::application::diagnostic::Diagnostic;
use crate::error::ProbeError;

/// Ordered collection of uniquely named diagnostics
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<Arc<dyn Diagnostic>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, keeping declaration order
    ///
    /// # Errors
    /// - ProbeError::DuplicateProbe if the name is already registered
    pub fn register(&mut self, diagnostic: Arc<dyn Diagnostic>) -> Result<(), ProbeError> {
        if self.get(diagnostic.name()).is_some() {
            return Err(ProbeError::DuplicateProbe(diagnostic.name().to_string()));
        }
        self.entries.push(diagnostic);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Diagnostic>> {
        self.entries.iter().find(|d| d.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|d| d.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Diagnostic>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diagnostics named in `names`, in declaration order; empty selects all
    ///
    /// # Errors
    /// - ProbeError::UnknownProbe for the first name not in the registry
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Diagnostic>>, ProbeError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n.as_ref()).is_none()) {
            return Err(ProbeError::UnknownProbe(unknown.as_ref().to_string()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|d| names.is_empty() || names.iter().any(|n| n.as_ref() == d.name()))
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::probe::Probe;
    use crate::domain::ProbeDefinition;
    use crate::port::command_runner::mocks::MockCommandRunner;
    use tokio_test::assert_ok;

    fn registry(names: &[&str]) -> Registry {
        let runner = Arc::new(MockCommandRunner::new());
        let mut registry = Registry::new();
        for name in names {
            let probe = Probe::new(ProbeDefinition::new(*name, "true"), runner.clone()).unwrap();
            registry.register(Arc::new(probe)).unwrap();
        }
        registry
    }

    #[test]
    fn test_select_keeps_declaration_order() {
        let registry = registry(&["dmesg", "df", "memory"]);

        let selected = assert_ok!(registry.select(&["memory", "dmesg"]));

        let names: Vec<&str> = selected.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["dmesg", "memory"]);
    }

    #[test]
    fn test_empty_selection_selects_all() {
        let registry = registry(&["dmesg", "df"]);

        let selected = registry.select::<&str>(&[]).unwrap();

        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let registry = registry(&["dmesg"]);

        let result = registry.select(&["nope"]);

        assert!(matches!(result, Err(ProbeError::UnknownProbe(name)) if name == "nope"));
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = registry(&["dmesg"]);
        let runner = Arc::new(MockCommandRunner::new());
        let dup = Probe::new(ProbeDefinition::new("dmesg", "dmesg"), runner).unwrap();

        let result = registry.register(Arc::new(dup));

        assert!(matches!(result, Err(ProbeError::DuplicateProbe(_))));
        assert_eq!(registry.len(), 1);
    }
}
