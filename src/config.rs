//! Settings resolution.
//!
//! Settings come from an optional YAML file overlaid with CLI flags and
//! environment variables (clap resolves those two). Validation happens
//! here, before any network or process work.
//!
//! ```yaml
//! download_path: ./.cache
//! tool_version: 2.4.0
//! php: /usr/bin/php
//! source: src/main/php
//! standard: src/test/checks/general-ruleset.xml
//! memory_limit: 512M
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::pipeline::{ExecutionContext, ToolSource};
use crate::runner::RunConfiguration;

/// Default timeout for downloading the tool archive.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Raw, possibly partial settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Existing PHP CodeSniffer installation.
    pub tool_path: Option<PathBuf>,
    /// Cache root to download PHP CodeSniffer into.
    pub download_path: Option<PathBuf>,
    /// Release to download.
    pub tool_version: Option<String>,
    /// PHP interpreter binary.
    pub php: Option<PathBuf>,
    /// Code to check.
    pub source: Option<PathBuf>,
    /// Coding standard or ruleset file.
    pub standard: Option<String>,
    pub memory_limit: Option<String>,
    pub timeout_secs: Option<u64>,
    pub download_base_url: Option<String>,
    pub download_timeout_secs: Option<u64>,
}

impl Settings {
    /// Loads settings from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::SettingsFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigurationError::SettingsFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Returns `self` with every value set in `overrides` replaced.
    pub fn overlay(self, overrides: Settings) -> Settings {
        Settings {
            tool_path: overrides.tool_path.or(self.tool_path),
            download_path: overrides.download_path.or(self.download_path),
            tool_version: overrides.tool_version.or(self.tool_version),
            php: overrides.php.or(self.php),
            source: overrides.source.or(self.source),
            standard: overrides.standard.or(self.standard),
            memory_limit: overrides.memory_limit.or(self.memory_limit),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            download_base_url: overrides.download_base_url.or(self.download_base_url),
            download_timeout_secs: overrides.download_timeout_secs.or(self.download_timeout_secs),
        }
    }

    /// Works out where the tool comes from.
    ///
    /// A configured download path wins over an installed tool path.
    pub fn tool_source(&self) -> Result<ToolSource, ConfigurationError> {
        if let Some(root) = non_blank_path(&self.download_path) {
            let version = non_blank(&self.tool_version).ok_or(ConfigurationError::MissingVersion)?;
            return Ok(ToolSource::Download {
                root,
                version,
            });
        }
        non_blank_path(&self.tool_path)
            .map(ToolSource::Installed)
            .ok_or(ConfigurationError::MissingToolLocation)
    }

    /// Timeout for the archive download.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(
            self.download_timeout_secs
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        )
    }

    /// Validates everything a check needs.
    pub fn check_plan(&self) -> Result<CheckPlan, ConfigurationError> {
        let tool = self.tool_source()?;
        let interpreter = non_blank_path(&self.php).ok_or(ConfigurationError::MissingInterpreter)?;
        let source = non_blank_path(&self.source).ok_or(ConfigurationError::MissingSourcePath)?;

        let timeout = match self.timeout_secs {
            Some(0) => {
                return Err(ConfigurationError::InvalidValue {
                    option: "timeout-secs".to_string(),
                    reason: "must be greater than zero".to_string(),
                })
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(CheckPlan {
            tool,
            interpreter,
            source,
            ruleset: non_blank(&self.standard),
            memory_limit: non_blank(&self.memory_limit),
            timeout,
        })
    }
}

/// Validated inputs of a `check`, minus the resolved tool path.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckPlan {
    pub tool: ToolSource,
    pub interpreter: PathBuf,
    pub source: PathBuf,
    pub ruleset: Option<String>,
    pub memory_limit: Option<String>,
    pub timeout: Option<Duration>,
}

impl CheckPlan {
    /// Builds the run configuration once the tool path is known.
    pub fn run_configuration(
        &self,
        context: &ExecutionContext,
    ) -> Result<RunConfiguration, ConfigurationError> {
        let mut config = RunConfiguration::new(
            context.tool_path.clone(),
            self.interpreter.clone(),
            self.source.clone(),
        )?;
        if let Some(ref ruleset) = self.ruleset {
            config = config.with_ruleset(ruleset.clone());
        }
        if let Some(ref limit) = self.memory_limit {
            config = config.with_memory_limit(limit.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        Ok(config)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn non_blank_path(value: &Option<PathBuf>) -> Option<PathBuf> {
    value
        .as_ref()
        .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
        .cloned()
}
