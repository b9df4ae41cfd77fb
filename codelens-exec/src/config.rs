use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{error::Error, types::Language, types::ResourceLimits, Result};

/// Execution settings, normally read once at startup
///
/// ```toml
/// max_concurrent_executions = 8
/// max_output_bytes = 20000
///
/// [limits]
/// cpu_time = 10
///
/// [languages.python]
/// run_timeout_secs = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Upper bound on child processes running at once
    pub max_concurrent_executions: usize,
    /// Capture limit for each of stdout and stderr (bytes)
    pub max_output_bytes: usize,
    /// Directory workspaces are created under; the system temp dir if unset
    pub workspace_root: Option<PathBuf>,
    pub limits: ResourceLimits,
    pub languages: HashMap<Language, LanguageOverride>,
}

/// Per-language adjustments to the built-in profile table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageOverride {
    pub compile_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
    /// Replacement compile argv; supports `{source}`, `{binary}`, `{class}`
    pub compile: Option<Vec<String>>,
    /// Replacement run argv
    pub run: Option<Vec<String>>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 4,
            max_output_bytes: 10_000,
            workspace_root: None,
            limits: ResourceLimits::default(),
            languages: HashMap::new(),
        }
    }
}

impl ExecConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: ExecConfig =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_executions == 0 {
            return Err(Error::Config(
                "max_concurrent_executions must be at least 1".to_string(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(Error::Config(
                "max_output_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
