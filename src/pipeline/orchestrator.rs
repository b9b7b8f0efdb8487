//! The check pipeline.

use std::path::PathBuf;

use tracing::info;

use crate::acquire::Acquirer;
use crate::config::CheckPlan;
use crate::error::{AcquireError, CheckError};
use crate::runner::{ExecutionResult, OutputSink, Runner};

/// Where the tool comes from for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    /// Use an existing installation as-is.
    Installed(PathBuf),
    /// Download `version` into the cache under `root` if missing.
    Download { root: PathBuf, version: String },
}

/// Per-invocation state handed from acquisition to execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Directory of the tool that will be run.
    pub tool_path: PathBuf,
}

/// Couples an [`Acquirer`] with a [`Runner`].
pub struct CheckPipeline {
    acquirer: Acquirer,
    runner: Runner,
}

impl CheckPipeline {
    pub fn new(acquirer: Acquirer, runner: Runner) -> Self {
        Self { acquirer, runner }
    }

    /// Resolves the tool directory, downloading it if needed.
    pub async fn resolve(&self, source: &ToolSource) -> Result<ExecutionContext, AcquireError> {
        let tool_path = match source {
            ToolSource::Installed(path) => path.clone(),
            ToolSource::Download { root, version } => {
                self.acquirer.ensure_installed(version, root).await?
            }
        };
        Ok(ExecutionContext { tool_path })
    }

    /// Resolves the tool and runs it once.
    pub async fn check(
        &self,
        plan: &CheckPlan,
        sink: &mut dyn OutputSink,
    ) -> Result<ExecutionResult, CheckError> {
        let context = self.resolve(&plan.tool).await?;
        let config = plan.run_configuration(&context)?;
        let result = self.runner.run(&config, sink).await?;
        info!("PHP CodeSniffer finished: {}", result.outcome());
        Ok(result)
    }
}
