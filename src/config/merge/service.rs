//! MergeService: orchestrates sources, applies merge policy, deserializes to AppConfig.

use crate::config::sources::{environment, global_file, workspace_file};
use crate::config::AppConfig;
use config::ConfigError;
use std::collections::HashMap;
use std::path::Path;

use super::merge_policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from workspace and standard sources.
    /// Precedence: defaults (lowest) -> global file -> workspace file -> environment (highest).
    pub fn load(workspace_root: &Path) -> Result<AppConfig, ConfigError> {
        let global = global_file::path();
        Self::load_layers(global.as_deref(), workspace_root, None)
    }

    /// Load with an explicit global file and, optionally, a substitute environment.
    ///
    /// `env` replaces the process environment when given; keys use the
    /// `FOLDERSEED__SECTION__KEY` form.
    pub fn load_layers(
        global_path: Option<&Path>,
        workspace_root: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<AppConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = match global_path {
            Some(path) => global_file::add_to_builder(builder, path)?,
            None => builder,
        };
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder, env)?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    /// The file must exist; global and workspace files are skipped.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        use config::File;

        if !path.is_file() {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder, None)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
