//! Results of a PHP CodeSniffer run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code the tool uses to report violations.
pub const VIOLATIONS_EXIT_CODE: i32 = 1;

/// Output and exit status of one run.
///
/// Only exit codes 0 and 1 produce a result; anything else is an
/// [`ExecutionError`](crate::error::ExecutionError).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn new(
        exit_code: i32,
        stdout_lines: Vec<String>,
        stderr_lines: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout_lines,
            stderr_lines,
            duration,
        }
    }

    /// Returns true if no violations were reported.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_success() {
            Outcome::Passed
        } else {
            Outcome::ViolationsFound
        }
    }
}

/// Verdict of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The source tree passed all checks.
    Passed,
    /// The tool ran and reported rule violations.
    ViolationsFound,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::ViolationsFound => write!(f, "violations found"),
        }
    }
}
