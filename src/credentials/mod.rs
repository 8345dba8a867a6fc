//! Credentials
//!
//! Credential profiles live outside the project tree, one toml file per profile
//! under `$XDG_CONFIG_HOME/folderseed/credentials/`. A profile says where the
//! Drive bearer token comes from; the token itself is only stored for the
//! `token` source. `FOLDERSEED_ACCESS_TOKEN` overrides any stored profile.

pub mod service_account;
pub mod storage;
pub mod xdg;

pub use service_account::ServiceAccountKey;
pub use storage::{CredentialStore, StoredCredential};
pub use xdg::XdgCredentialStore;

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Environment variable that overrides every stored profile
pub const ACCESS_TOKEN_ENV: &str = "FOLDERSEED_ACCESS_TOKEN";

/// Where a bearer token is obtained
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    /// A literal OAuth access token
    Token { access_token: String },
    /// An environment variable holding the token
    Env { variable: String },
    /// A command printing the token on stdout
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// A service account key, exchanged for a token on each use
    ServiceAccount { key: ServiceAccountKey },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl CredentialSource {
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialSource::Token { .. } => "token",
            CredentialSource::Env { .. } => "env",
            CredentialSource::Command { .. } => "command",
            CredentialSource::ServiceAccount { .. } => "service_account",
        }
    }

    /// Human-readable description that never contains the secret.
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Token { access_token } => {
                format!("token {}", redact(access_token))
            }
            CredentialSource::Env { variable } => format!("env ${}", variable),
            CredentialSource::Command { program, args } => {
                if args.is_empty() {
                    format!("command `{}`", program)
                } else {
                    format!("command `{} {}`", program, args.join(" "))
                }
            }
            CredentialSource::ServiceAccount { key } => format!(
                "service account {} (project {})",
                key.client_email, key.project_id
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let problem = match self {
            CredentialSource::Token { access_token } if access_token.trim().is_empty() => {
                Some("access token is empty")
            }
            CredentialSource::Env { variable } if variable.trim().is_empty() => {
                Some("environment variable name is empty")
            }
            CredentialSource::Command { program, .. } if program.trim().is_empty() => {
                Some("command is empty")
            }
            CredentialSource::ServiceAccount { key } => return key.validate(),
            _ => None,
        };
        match problem {
            Some(msg) => Err(ApiError::ConfigError(format!("Invalid credential: {}", msg))),
            None => Ok(()),
        }
    }

    /// Produce the bearer token this source points at.
    pub async fn resolve(&self) -> Result<String, ApiError> {
        let token = match self {
            CredentialSource::Token { access_token } => access_token.trim().to_string(),
            CredentialSource::Env { variable } => std::env::var(variable)
                .map(|v| v.trim().to_string())
                .map_err(|_| {
                    ApiError::ConfigError(format!(
                        "Credential variable ${} is not set",
                        variable
                    ))
                })?,
            CredentialSource::Command { program, args } => {
                let output = tokio::process::Command::new(program)
                    .args(args)
                    .output()
                    .await
                    .map_err(|e| {
                        ApiError::ConfigError(format!(
                            "Failed to run credential command '{}': {}",
                            program, e
                        ))
                    })?;
                if !output.status.success() {
                    return Err(ApiError::ConfigError(format!(
                        "Credential command '{}' failed ({}): {}",
                        program,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            CredentialSource::ServiceAccount { key } => {
                key.exchange(&reqwest::Client::new()).await?.trim().to_string()
            }
        };
        if token.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "Credential {} produced an empty token",
                self.describe()
            )));
        }
        Ok(token)
    }
}

/// Contents of one stored profile file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialProfile {
    #[serde(default)]
    pub profile_name: Option<String>,
    pub source: CredentialSource,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CredentialProfile {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            profile_name: None,
            source,
            created_at: Some(Utc::now()),
        }
    }
}

/// Profile names become file names: ASCII letters, digits, `-` and `_` only.
pub fn validate_profile_name(profile: &str) -> Result<(), ApiError> {
    let valid = !profile.is_empty()
        && profile.len() <= 64
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::ConfigError(format!(
            "Invalid credential profile name '{}': use letters, digits, '-' or '_'",
            profile
        )))
    }
}

/// Resolve the token for `profile`, letting `FOLDERSEED_ACCESS_TOKEN` win.
pub async fn resolve_access_token(
    store: &dyn CredentialStore,
    profile: &str,
) -> Result<String, ApiError> {
    let env_override = std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty());
    resolve_with_override(store, profile, env_override).await
}

/// Resolution with an explicit override in place of the environment.
pub async fn resolve_with_override(
    store: &dyn CredentialStore,
    profile: &str,
    env_override: Option<String>,
) -> Result<String, ApiError> {
    if let Some(token) = env_override {
        debug!(variable = ACCESS_TOKEN_ENV, "Using access token from environment");
        return Ok(token.trim().to_string());
    }
    let stored = store.load(profile)?.ok_or_else(|| {
        ApiError::ConfigError(format!(
            "No credentials for profile '{}'. Run `folderseed credentials set --profile {}` or set {}",
            profile, profile, ACCESS_TOKEN_ENV
        ))
    })?;
    debug!(profile, source = stored.source.kind(), "Resolving stored credential");
    stored.source.resolve().await
}

fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
