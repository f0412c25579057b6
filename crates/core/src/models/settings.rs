use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Default object-storage bucket for uploaded resources and images.
pub const DEFAULT_STORAGE_BUCKET: &str = "resources";

/// Header carrying the admin code on privileged backend calls.
pub const DEFAULT_ADMIN_HEADER: &str = "x-admin-code";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcd.example.co` (no trailing slash needed).
    pub url: String,

    /// Public (anonymous) API key, sent as `apikey` and as the bearer token.
    pub anon_key: String,

    /// Bucket used for resource uploads.
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,

    /// Name of the header the admin client attaches the admin code to.
    #[serde(default = "default_admin_header")]
    pub admin_header: String,

    /// Current version of the shared client access code. When set, client
    /// sessions persisted under a different version are treated as expired.
    #[serde(default)]
    pub client_code_version: Option<String>,
}

fn default_bucket() -> String {
    DEFAULT_STORAGE_BUCKET.to_string()
}

fn default_admin_header() -> String {
    DEFAULT_ADMIN_HEADER.to_string()
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            storage_bucket: default_bucket(),
            admin_header: default_admin_header(),
            client_code_version: None,
        }
    }

    /// Read the configuration from `CMS_BACKEND_URL`, `CMS_ANON_KEY`,
    /// `CMS_STORAGE_BUCKET` and `CMS_CLIENT_CODE_VERSION`.
    pub fn from_env() -> Result<Self, CoreError> {
        let url = std::env::var("CMS_BACKEND_URL")
            .map_err(|_| CoreError::Config("CMS_BACKEND_URL is not set".into()))?;
        let anon_key = std::env::var("CMS_ANON_KEY")
            .map_err(|_| CoreError::Config("CMS_ANON_KEY is not set".into()))?;

        let mut config = Self::new(url, anon_key);
        if let Ok(bucket) = std::env::var("CMS_STORAGE_BUCKET") {
            if !bucket.trim().is_empty() {
                config.storage_bucket = bucket.trim().to_string();
            }
        }
        config.client_code_version = std::env::var("CMS_CLIENT_CODE_VERSION")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let mut config: BackendConfig = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Failed to parse config: {e}")))?;
        config.url = config.url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn with_client_code_version(mut self, version: impl Into<String>) -> Self {
        self.client_code_version = Some(version.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.url.trim().is_empty() {
            return Err(CoreError::Config("backend url must not be empty".into()));
        }
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(CoreError::Config(format!(
                "backend url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(CoreError::Config("anon key must not be empty".into()));
        }
        if self.storage_bucket.trim().is_empty() {
            return Err(CoreError::Config("storage bucket must not be empty".into()));
        }
        if self.admin_header.trim().is_empty() {
            return Err(CoreError::Config("admin header name must not be empty".into()));
        }
        Ok(())
    }
}
