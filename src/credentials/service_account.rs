//! Google service account keys
//!
//! A key is the JSON document downloaded from the Cloud console. It is checked
//! when stored and exchanged for a short-lived Drive access token through the
//! OAuth JWT bearer grant each time a command needs one.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// OAuth scope granting full Drive access
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Token endpoint used when the key does not name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Fields a key must carry to be usable
const REQUIRED_FIELDS: [&str; 4] = ["type", "client_email", "private_key", "project_id"];

/// Lifetime requested for each assertion; Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Service account key, as stored in a credential profile
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"****")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    /// Parse and check a downloaded key file.
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            ApiError::ConfigError(format!("Service account key is not valid JSON: {}", e))
        })?;
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| value.get(field).and_then(|v| v.as_str()).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "Service account key is missing required fields: {}",
                missing.join(", ")
            )));
        }
        let key: ServiceAccountKey = serde_json::from_value(value).map_err(|e| {
            ApiError::ConfigError(format!("Invalid service account key: {}", e))
        })?;
        key.validate()?;
        Ok(key)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.key_type != "service_account" {
            return Err(ApiError::ConfigError(format!(
                "Invalid credential type: expected 'service_account', got '{}'",
                self.key_type
            )));
        }
        for (field, value) in [
            ("client_email", &self.client_email),
            ("private_key", &self.private_key),
            ("project_id", &self.project_id),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::ConfigError(format!(
                    "Service account key field '{}' is empty",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn claims(&self, now: DateTime<Utc>) -> Claims<'_> {
        let iat = now.timestamp();
        Claims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: self.token_uri(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    /// RS256-signed JWT asserting this account's identity at `now`.
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, ApiError> {
        let signing_key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            ApiError::ConfigError(format!(
                "Service account private key for {} is unusable: {}",
                self.client_email, e
            ))
        })?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        jsonwebtoken::encode(&header, &self.claims(now), &signing_key).map_err(|e| {
            ApiError::ConfigError(format!("Failed to sign service account assertion: {}", e))
        })
    }

    /// Trade a fresh assertion for a Drive access token.
    pub async fn exchange(&self, client: &reqwest::Client) -> Result<String, ApiError> {
        let assertion = self.signed_assertion(Utc::now())?;
        debug!(
            client_email = %self.client_email,
            token_uri = self.token_uri(),
            "Exchanging service account assertion"
        );
        let response = client
            .post(self.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| {
                ApiError::ConfigError(format!("Service account token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::ConfigError(format!(
                "Service account token request for {} rejected ({}): {}",
                self.client_email,
                status,
                body.trim()
            )));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            ApiError::ConfigError(format!("Malformed token response: {}", e))
        })?;
        Ok(token.access_token)
    }
}
