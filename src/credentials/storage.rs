use crate::credentials::CredentialProfile;
use crate::error::ApiError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub profile: String,
    pub credential: CredentialProfile,
    pub path: PathBuf,
}

pub trait CredentialStore: Send + Sync {
    fn list(&self) -> Result<Vec<StoredCredential>, ApiError>;
    fn path_for(&self, profile: &str) -> Result<PathBuf, ApiError>;
    fn load(&self, profile: &str) -> Result<Option<CredentialProfile>, ApiError>;
    fn store(&self, profile: &str, credential: &CredentialProfile) -> Result<PathBuf, ApiError>;
    fn delete(&self, profile: &str) -> Result<(), ApiError>;

    fn exists(&self, profile: &str) -> Result<bool, ApiError> {
        Ok(self.load(profile)?.is_some())
    }
}
