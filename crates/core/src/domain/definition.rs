// Probe definitions: raw configuration, compiled by the application layer

use std::sync::Arc;

/// Custom output processor: decoded stdout -> failure reasons
pub type Processor = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Custom skip decision over the trimmed stdout of the check command
pub type SkipPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Probe-level skip capability
///
/// Evaluated before any diagnostic command runs; a positive decision means
/// the probe's commands never execute.
#[derive(Clone)]
pub enum SkipCheck {
    /// Skip unless `command` prints an absolute path ending in `tool`
    ToolMissing { command: String, tool: String },
    /// Skip when `predicate` returns true for the output of `command`
    Custom {
        command: String,
        predicate: SkipPredicate,
    },
}

impl SkipCheck {
    /// Tool-presence check, e.g. `SkipCheck::tool("which smartctl")`
    ///
    /// The expected tool is the second word of the command (or the only word).
    pub fn tool(command: impl Into<String>) -> Self {
        let command = command.into();
        let mut words = command.split_whitespace();
        let first = words.next().unwrap_or_default();
        let tool = words.next().unwrap_or(first).to_string();
        SkipCheck::ToolMissing { command, tool }
    }

    pub fn custom<F>(command: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        SkipCheck::Custom {
            command: command.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            SkipCheck::ToolMissing { command, .. } | SkipCheck::Custom { command, .. } => command,
        }
    }

    /// Decide from the check command's output
    pub fn decide(&self, output: &str) -> bool {
        let output = output.trim();
        match self {
            SkipCheck::ToolMissing { tool, .. } => !looks_like_tool_path(output, tool),
            SkipCheck::Custom { predicate, .. } => predicate(output),
        }
    }
}

impl std::fmt::Debug for SkipCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipCheck::ToolMissing { command, tool } => f
                .debug_struct("ToolMissing")
                .field("command", command)
                .field("tool", tool)
                .finish(),
            SkipCheck::Custom { command, .. } => {
                f.debug_struct("Custom").field("command", command).finish()
            }
        }
    }
}

/// `^/.*<tool>$` on a single line
fn looks_like_tool_path(output: &str, tool: &str) -> bool {
    !tool.is_empty()
        && !output.contains('\n')
        && output.starts_with('/')
        && output.len() > tool.len()
        && output.ends_with(tool)
}

/// Raw probe configuration
///
/// Patterns are stored as strings here and compiled exactly once when the
/// probe is constructed.
///
/// # Example
/// ```text
/// let def = ProbeDefinition::new("iplink", "ip link")
///     .fail_patterns([r"^\d+:[^\n]*state DOWN[^\n]*$"])
///     .message("links up");
/// ```
#[derive(Clone)]
pub struct ProbeDefinition {
    pub name: String,
    pub command: String,
    pub devices: Option<String>,
    pub skip_patterns: Vec<String>,
    pub fail_patterns: Vec<String>,
    pub pass_patterns: Vec<String>,
    pub processor: Option<Processor>,
    pub fail_on_output: bool,
    /// As a long-probe checker, classify only output that appeared after the stressor started
    pub since_start: bool,
    pub skip: Option<SkipCheck>,
    pub requires: Option<String>,
    pub message: String,
}

impl ProbeDefinition {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            devices: None,
            skip_patterns: Vec::new(),
            fail_patterns: Vec::new(),
            pass_patterns: Vec::new(),
            processor: None,
            fail_on_output: false,
            since_start: false,
            skip: None,
            requires: None,
            message: String::new(),
        }
    }

    /// Command whose output lists one device per line, substituted into `{device}`
    pub fn devices(mut self, command: impl Into<String>) -> Self {
        self.devices = Some(command.into());
        self
    }

    pub fn skip_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn fail_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Output FAILS unless one of these matches
    pub fn pass_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pass_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Fail on any non-empty output
    pub fn fail_on_output(mut self) -> Self {
        self.fail_on_output = true;
        self
    }

    /// Ignore output already present when a long probe starts (log-style checkers)
    pub fn since_start(mut self) -> Self {
        self.since_start = true;
        self
    }

    pub fn skip(mut self, skip: SkipCheck) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn requires(mut self, requires: impl Into<String>) -> Self {
        self.requires = Some(requires.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl std::fmt::Debug for ProbeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeDefinition")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("devices", &self.devices)
            .field("skip_patterns", &self.skip_patterns)
            .field("fail_patterns", &self.fail_patterns)
            .field("pass_patterns", &self.pass_patterns)
            .field("processor", &self.processor.is_some())
            .field("fail_on_output", &self.fail_on_output)
            .field("since_start", &self.since_start)
            .field("skip", &self.skip)
            .field("requires", &self.requires)
            .finish()
    }
}
