//! Configuration
//!
//! `AppConfig` is assembled by [`ConfigLoader`] from built-in defaults, the
//! global XDG file, the workspace file and `FOLDERSEED__*` environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::ApiError;
use crate::gateway::DriveConfig;
use crate::logging::LoggingConfig;
use crate::replication::RetryConfig;
use crate::tree::reader::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};

/// Name of the per-workspace config file
pub const WORKSPACE_CONFIG_FILE: &str = "folderseed.toml";

/// Replication engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Concurrent gateway calls; 1 is strictly sequential
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Minimum delay between mutating calls, in milliseconds (0 disables)
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_concurrency() -> usize {
    1
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            pacing_ms: default_pacing_ms(),
            max_depth: default_max_depth(),
            retry: RetryConfig::default(),
        }
    }
}

/// Which stored credential profile to use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
}

fn default_profile() -> String {
    "default".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Template folder to replicate
    #[serde(default)]
    pub template_folder_id: String,

    /// Folder under which new workspaces are created
    #[serde(default)]
    pub target_parent_folder_id: String,

    #[serde(default)]
    pub replication: ReplicationConfig,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Check everything a replication run depends on.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();

        if self.template_folder_id.trim().is_empty() {
            errors.push("template_folder_id is not set".to_string());
        }
        if self.target_parent_folder_id.trim().is_empty() {
            errors.push("target_parent_folder_id is not set".to_string());
        }
        if self.replication.concurrency == 0 {
            errors.push("replication.concurrency must be at least 1".to_string());
        }
        if self.replication.retry.max_attempts == 0 {
            errors.push("replication.retry.max_attempts must be at least 1".to_string());
        }
        if !(self.replication.retry.multiplier >= 1.0) {
            errors.push(format!(
                "replication.retry.multiplier must be >= 1.0, got {}",
                self.replication.retry.multiplier
            ));
        }
        if self.replication.retry.initial_backoff_ms > self.replication.retry.max_backoff_ms {
            errors.push(
                "replication.retry.initial_backoff_ms exceeds max_backoff_ms".to_string(),
            );
        }
        if !(self.drive.api_base.starts_with("https://") || self.drive.api_base.starts_with("http://"))
        {
            errors.push(format!(
                "drive.api_base must be an http(s) URL, got '{}'",
                self.drive.api_base
            ));
        }
        if self.credentials.profile.trim().is_empty() {
            errors.push("credentials.profile must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ConfigError(format!(
                "Invalid configuration: {}",
                errors.join("; ")
            )))
        }
    }
}
