//! Logging System
//!
//! Structured logging using the `tracing` crate. Level, format and destination
//! come from `[logging]` in the config file and can be overridden through the
//! `FOLDERSEED_LOG*` environment variables or CLI flags.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const ENV_LOG: &str = "FOLDERSEED_LOG";
pub const ENV_LOG_FORMAT: &str = "FOLDERSEED_LOG_FORMAT";
pub const ENV_LOG_OUTPUT: &str = "FOLDERSEED_LOG_OUTPUT";
pub const ENV_LOG_FILE: &str = "FOLDERSEED_LOG_FILE";
pub const ENV_LOG_MODULES: &str = "FOLDERSEED_LOG_MODULES";

/// Resolve the log file path with precedence: CLI, FOLDERSEED_LOG_FILE env, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ApiError> {
    if let Some(p) = cli_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var(ENV_LOG_FILE) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let project_dirs =
        directories::ProjectDirs::from("", "folderseed", "folderseed").ok_or_else(|| {
            ApiError::ConfigError(
                "Could not determine platform state directory for log file".to_string(),
            )
        })?;
    // macOS and Windows have no state dir; fall back to the data dir there.
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("folderseed.log"))
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// `trace` through `error`, or `off`
    #[serde(default = "LoggingConfig::info")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "LoggingConfig::text")]
    pub format: String,

    /// `stdout`, `stderr`, `file`, `file+stderr` or `both`
    #[serde(default = "LoggingConfig::file_only")]
    pub output: String,

    /// Overrides the platform state-dir log file
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// ANSI colours for text output to a terminal stream
    #[serde(default = "enabled_by_default")]
    pub color: bool,

    /// Per-target levels, e.g. `reqwest = "warn"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn enabled_by_default() -> bool {
    true
}

impl LoggingConfig {
    fn info() -> String {
        "info".into()
    }

    fn text() -> String {
        "text".into()
    }

    fn file_only() -> String {
        "file".into()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            enabled: true,
            level: Self::info(),
            format: Self::text(),
            output: Self::file_only(),
            file: None,
            color: true,
            modules: HashMap::default(),
        }
    }
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest):
/// 1. CLI arguments (already folded into `config` by the caller)
/// 2. Environment variables (FOLDERSEED_LOG, FOLDERSEED_LOG_FORMAT, ...)
/// 3. Configuration file
/// 4. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    if config.is_some_and(|c| !c.enabled) {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(|e| ApiError::ConfigError(format!("Failed to initialize logging: {}", e)));
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let ansi = config.map(|c| c.color).unwrap_or(true) && !output.file;

    let writer = if output.file {
        let path = resolve_log_file_path(None, config.and_then(|c| c.file.clone()))?;
        let file = Arc::new(open_log_file(&path)?);
        if output.stderr {
            BoxMakeWriter::new(file.and(std::io::stderr))
        } else {
            BoxMakeWriter::new(file)
        }
    } else if output.stdout && output.stderr {
        BoxMakeWriter::new(std::io::stdout.and(std::io::stderr))
    } else if output.stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    let result = if format == LogFormat::Json {
        Registry::default().with(filter).with(layer.json()).try_init()
    } else {
        Registry::default()
            .with(filter)
            .with(layer.with_ansi(ansi))
            .try_init()
    };
    result.map_err(|e| ApiError::ConfigError(format!("Failed to initialize logging: {}", e)))
}

fn open_log_file(path: &std::path::Path) -> Result<std::fs::File, ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ApiError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_LOG) {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = Vec::new();
    if let Some(config) = config {
        directives.extend(
            config
                .modules
                .iter()
                .map(|(module, module_level)| format!("{}={}", module, module_level)),
        );
    }
    if let Ok(modules_str) = std::env::var(ENV_LOG_MODULES) {
        directives.extend(parse_module_directives(&modules_str));
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| ApiError::ConfigError(format!("Invalid log directive '{}': {}", directive, e)))?,
        );
    }
    Ok(filter)
}

/// `"folderseed::gateway=debug, reqwest=warn"` → `["folderseed::gateway=debug", "reqwest=warn"]`
fn parse_module_directives(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let (module, level) = part.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then(|| format!("{}={}", module, level))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Unknown log format '{}', expected text or json",
                other
            ))),
        }
    }
}

/// An unparseable `FOLDERSEED_LOG_FORMAT` is ignored in favour of the config value.
fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, ApiError> {
    if let Some(format) = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
    {
        return Ok(format);
    }
    config.map_or(Ok(LogFormat::Text), |c| c.format.parse())
}

/// Where events are written
#[derive(Debug, PartialEq, Eq)]
struct Sinks {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl FromStr for Sinks {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sinks = |stdout, stderr, file| Sinks {
            stdout,
            stderr,
            file,
        };
        match s.trim() {
            "stdout" => Ok(sinks(true, false, false)),
            "stderr" => Ok(sinks(false, true, false)),
            "file" => Ok(sinks(false, false, true)),
            "file+stderr" => Ok(sinks(false, true, true)),
            "both" => Ok(sinks(true, true, false)),
            other => Err(ApiError::ConfigError(format!(
                "Unknown log output '{}', expected stdout, stderr, file, file+stderr or both",
                other
            ))),
        }
    }
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<Sinks, ApiError> {
    match std::env::var(ENV_LOG_OUTPUT) {
        Ok(output) => output.parse(),
        Err(_) => config.map_or("file", |c| c.output.as_str()).parse(),
    }
}
