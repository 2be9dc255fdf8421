//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;
mod keys;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;
pub use keys::{KeyMaterial, RequiredKeys};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prefix for case paths that are not absolute URLs
    pub base_url: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Full-suite runs in concurrent mode
    pub repeat_times: u32,

    /// Worker pool size in concurrent mode
    pub max_workers: usize,

    /// Run-level success ratio the concurrent mode must exceed
    pub success_threshold: f64,

    /// Mark cases SKIPPED when a dependency did not pass
    pub skip_on_dependency_failure: bool,

    /// YAML file holding channel and platform keys
    pub keys_file: Option<PathBuf>,

    /// Where to write the run snapshot, if anywhere
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            repeat_times: 10,
            max_workers: 5,
            success_threshold: 0.8,
            skip_on_dependency_failure: false,
            keys_file: None,
            snapshot_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if file::is_yaml_file(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        if self.repeat_times == 0 {
            anyhow::bail!("repeat_times must be at least 1");
        }
        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.success_threshold) {
            anyhow::bail!(
                "success_threshold must be between 0 and 1, got {}",
                self.success_threshold
            );
        }
        Ok(())
    }

    /// Overlay values set through environment variables
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(base_url) = &env.base_url {
            self.base_url = Some(base_url.clone());
        }
        self.timeout_secs = env.timeout_or(self.timeout_secs);
        self.repeat_times = env.repeat.unwrap_or(self.repeat_times);
        self.max_workers = env.workers.unwrap_or(self.max_workers);
        self.success_threshold = env.threshold.unwrap_or(self.success_threshold);
        if let Some(keys_file) = &env.keys_file {
            self.keys_file = Some(PathBuf::from(keys_file));
        }
    }
}
