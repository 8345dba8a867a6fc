use crate::credentials::{validate_profile_name, CredentialProfile, CredentialStore, StoredCredential};
use crate::error::ApiError;
use std::io::Write;
use std::path::PathBuf;

/// Profiles as `<profile>.toml` files in the XDG credentials directory.
pub struct XdgCredentialStore {
    root: Option<PathBuf>,
}

impl XdgCredentialStore {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Store rooted at `dir` instead of the XDG location.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(dir.into()),
        }
    }

    fn dir(&self) -> Result<PathBuf, ApiError> {
        match &self.root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    ApiError::ConfigError(format!(
                        "Failed to create credentials directory {}: {}",
                        root.display(),
                        e
                    ))
                })?;
                Ok(root.clone())
            }
            None => crate::config::xdg::credentials_dir(),
        }
    }

    fn read_profile(path: &std::path::Path) -> Result<CredentialProfile, ApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to read credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to parse credential file {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl Default for XdgCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for XdgCredentialStore {
    fn list(&self) -> Result<Vec<StoredCredential>, ApiError> {
        let dir = self.dir()?;
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to read credentials directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut loaded = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(e) => e.path(),
                Err(e) => {
                    tracing::warn!("Failed to read directory entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if path.extension() != Some(std::ffi::OsStr::new("toml")) {
                continue;
            }
            let Some(profile) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                tracing::warn!("Invalid credential filename non UTF8: {:?}", path);
                continue;
            };
            match Self::read_profile(&path) {
                Ok(credential) => loaded.push(StoredCredential {
                    profile,
                    credential,
                    path,
                }),
                Err(e) => tracing::error!("{}", e),
            }
        }
        loaded.sort_by(|a, b| a.profile.cmp(&b.profile));
        Ok(loaded)
    }

    fn path_for(&self, profile: &str) -> Result<PathBuf, ApiError> {
        validate_profile_name(profile)?;
        Ok(self.dir()?.join(format!("{}.toml", profile)))
    }

    fn load(&self, profile: &str) -> Result<Option<CredentialProfile>, ApiError> {
        let path = self.path_for(profile)?;
        if !path.exists() {
            return Ok(None);
        }
        Self::read_profile(&path).map(Some)
    }

    fn store(&self, profile: &str, credential: &CredentialProfile) -> Result<PathBuf, ApiError> {
        credential.source.validate()?;
        let path = self.path_for(profile)?;

        let mut credential = credential.clone();
        if credential.profile_name.is_none() {
            credential.profile_name = Some(profile.to_string());
        }
        let content = toml::to_string_pretty(&credential).map_err(|e| {
            ApiError::ConfigError(format!("Failed to serialize credential: {}", e))
        })?;

        let mut options = std::fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to open credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        file.write_all(content.as_bytes()).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to write credential file {}: {}",
                path.display(),
                e
            ))
        })?;

        // An existing file keeps its old mode on open; tighten it explicitly.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        tracing::info!(profile, source = credential.source.kind(), "Stored credential profile");
        Ok(path)
    }

    fn delete(&self, profile: &str) -> Result<(), ApiError> {
        let path = self.path_for(profile)?;
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "No credentials stored for profile '{}'",
                profile
            )));
        }
        std::fs::remove_file(&path).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to delete credential file {}: {}",
                path.display(),
                e
            ))
        })
    }
}
