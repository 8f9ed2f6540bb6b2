//! Hashing run configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for one hashing run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct HashConfig {
    /// Root directory to hash.
    pub root: PathBuf,

    /// Time budget for the entire run.
    #[builder(default = "Duration::from_secs(30 * 60)")]
    #[serde(default = "default_run_timeout")]
    pub run_timeout: Duration,

    /// Time budget for the whole-file hash of a single file.
    #[builder(default = "Duration::from_secs(10 * 60)")]
    #[serde(default = "default_file_timeout")]
    pub file_timeout: Duration,

    /// How often the progress display is refreshed.
    #[builder(default = "Duration::from_millis(100)")]
    #[serde(default = "default_render_interval")]
    pub render_interval: Duration,

    /// Name of the per-directory ignore file.
    #[builder(default = "\".hiveignore\".to_string()")]
    #[serde(default = "default_ignore_file_name")]
    pub ignore_file_name: String,

    /// Number of recently hashed files kept for display.
    #[builder(default = "5")]
    #[serde(default = "default_recent_files")]
    pub recent_files: usize,

    /// Count files and bytes up front so progress has totals.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub prescan: bool,
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_file_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_render_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_ignore_file_name() -> String {
    ".hiveignore".to_string()
}

fn default_recent_files() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl HashConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err("Run timeout must be greater than zero".to_string());
        }
        if self.file_timeout.is_some_and(|t| t.is_zero()) {
            return Err("File timeout must be greater than zero".to_string());
        }
        if self.ignore_file_name.as_ref().is_some_and(|n| n.is_empty()) {
            return Err("Ignore file name cannot be empty".to_string());
        }
        Ok(())
    }
}

impl HashConfig {
    /// Create a new config builder.
    pub fn builder() -> HashConfigBuilder {
        HashConfigBuilder::default()
    }

    /// Create a config with defaults for hashing a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            run_timeout: default_run_timeout(),
            file_timeout: default_file_timeout(),
            render_interval: default_render_interval(),
            ignore_file_name: default_ignore_file_name(),
            recent_files: default_recent_files(),
            prescan: true,
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
