//! Global config file: $XDG_CONFIG_HOME/folderseed/config.toml (optional)

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

/// Location of the global config file, if a config home can be determined.
pub fn path() -> Option<PathBuf> {
    xdg::global_config_path().ok()
}

/// Add the global file to builder; a missing file is skipped.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(File::from(path).required(false)))
}
