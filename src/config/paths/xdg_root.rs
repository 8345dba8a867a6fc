//! XDG Base Directory utilities for config and credential storage.

use crate::error::ApiError;
use std::path::PathBuf;

/// Application directory name under the XDG base directories
pub const APP_DIR: &str = "folderseed";

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
/// Follows XDG Base Directory Specification
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/folderseed/`
pub fn app_config_dir() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR))
}

/// `$XDG_CONFIG_HOME/folderseed/config.toml`
pub fn global_config_path() -> Result<PathBuf, ApiError> {
    Ok(app_config_dir()?.join("config.toml"))
}

/// Get credentials directory path
///
/// Returns `$XDG_CONFIG_HOME/folderseed/credentials/`
/// Creates the directory if it doesn't exist
pub fn credentials_dir() -> Result<PathBuf, ApiError> {
    let credentials_dir = app_config_dir()?.join("credentials");

    if !credentials_dir.exists() {
        std::fs::create_dir_all(&credentials_dir).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to create credentials directory {}: {}",
                credentials_dir.display(),
                e
            ))
        })?;
    }

    Ok(credentials_dir)
}
