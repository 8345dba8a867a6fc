//! Environment variable source: FOLDERSEED__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "FOLDERSEED";

/// Add environment variable overlay to builder.
/// Uses FOLDERSEED prefix and __ as separator for nested keys, e.g.
/// `FOLDERSEED__REPLICATION__CONCURRENCY=4`. `source` substitutes the process environment.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    source: Option<HashMap<String, String>>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(source),
    );
    Ok(builder)
}
