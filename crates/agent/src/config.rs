//! Per-run agent configuration.
//!
//! Immutable for the duration of a run. Loadable from TOML; every field
//! except the two prompt templates has a serde default.

use std::path::{Path, PathBuf};

use ironloop_core::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Template for the system message (the first message).
    pub system_template: String,

    /// Template for the first user message specifying the task.
    pub instance_template: String,

    /// Maximum number of model queries. 0 = unlimited.
    #[serde(default)]
    pub step_limit: u32,

    /// Stop the run once accumulated cost reaches this. 0 or negative disables.
    #[serde(default = "default_cost_limit")]
    pub cost_limit: f64,

    /// Snapshot destination, overwritten on every checkpoint.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// How to discover an unknown model's context window.
    #[serde(default)]
    pub context_window_mode: ContextWindowMode,
}

fn default_cost_limit() -> f64 {
    3.0
}

/// Whether a context-window cache miss may fall back to an interactive
/// resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextWindowMode {
    /// Cache lookup only; unknown models leave the budget unset
    #[default]
    Auto,
    /// Consult the injected resolver on a cache miss
    Interactive,
}

impl AgentConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid agent config: {e}"),
        })
    }

    /// Load a config from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }
}
