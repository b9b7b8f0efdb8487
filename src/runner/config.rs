//! Configuration for a single PHP CodeSniffer run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Memory limit handed to the interpreter when none is configured.
pub const DEFAULT_MEMORY_LIMIT: &str = "250M";

/// Entry script, relative to `<tool_path>/scripts`.
pub const ENTRY_SCRIPT: &str = "phpcs";

/// Everything needed to build the command line for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Directory holding the installed tool.
    pub tool_path: PathBuf,
    /// PHP interpreter binary.
    pub interpreter_path: PathBuf,
    /// File or directory to check.
    pub source_path: PathBuf,
    /// Coding standard or ruleset file passed as `--standard`.
    pub ruleset: Option<String>,
    /// Value for the interpreter's `memory_limit` directive.
    pub memory_limit: String,
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl RunConfiguration {
    /// Creates a configuration with the default memory limit and no
    /// ruleset or timeout.
    pub fn new(
        tool_path: impl Into<PathBuf>,
        interpreter_path: impl Into<PathBuf>,
        source_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigurationError> {
        let tool_path = tool_path.into();
        let interpreter_path = interpreter_path.into();
        let source_path = source_path.into();

        if is_blank(&tool_path) {
            return Err(ConfigurationError::MissingToolLocation);
        }
        if is_blank(&interpreter_path) {
            return Err(ConfigurationError::MissingInterpreter);
        }
        if is_blank(&source_path) {
            return Err(ConfigurationError::MissingSourcePath);
        }

        Ok(Self {
            tool_path,
            interpreter_path,
            source_path,
            ruleset: None,
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
            timeout: None,
        })
    }

    /// Sets the ruleset selector.
    pub fn with_ruleset(mut self, ruleset: impl Into<String>) -> Self {
        self.ruleset = Some(ruleset.into());
        self
    }

    /// Sets the memory limit. Blank values keep the default.
    pub fn with_memory_limit(mut self, limit: impl Into<String>) -> Self {
        let limit = limit.into();
        if !limit.trim().is_empty() {
            self.memory_limit = limit.trim().to_string();
        }
        self
    }

    /// Sets the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Gets the entry script path.
    pub fn entry_script(&self) -> PathBuf {
        self.tool_path.join("scripts").join(ENTRY_SCRIPT)
    }

    /// Builds the full argument vector, program first.
    ///
    /// `<php> -d memory_limit=<limit> -f <tool>/scripts/phpcs -- -sp [--standard=<ruleset>] <source>`
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = vec![
            display(&self.interpreter_path),
            "-d".to_string(),
            format!("memory_limit={}", self.memory_limit),
            "-f".to_string(),
            display(&self.entry_script()),
            "--".to_string(),
            "-sp".to_string(),
        ];
        if let Some(ref ruleset) = self.ruleset {
            argv.push(format!("--standard={ruleset}"));
        }
        argv.push(display(&self.source_path));
        argv
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
