//! Startup configuration for smartmark.
//!
//! Two externally supplied values are required for any backend-dependent
//! operation: the store's network address and its public API key. Their
//! absence is a fatal configuration error, surfaced before anything else
//! runs.

use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::types::errors::ConfigError;

/// Environment variable holding the backend's base URL.
pub const BACKEND_URL_VAR: &str = "SMARTMARK_BACKEND_URL";
/// Environment variable holding the backend's public API key.
pub const ANON_KEY_VAR: &str = "SMARTMARK_ANON_KEY";
/// Environment variable overriding where local state (the session file) lives.
pub const DATA_DIR_VAR: &str = "SMARTMARK_DATA_DIR";

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Public API key sent with every request.
    pub anon_key: String,
}

impl BackendConfig {
    /// Loads the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(env::var(BACKEND_URL_VAR).ok(), env::var(ANON_KEY_VAR).ok())
    }

    /// Builds a configuration from the two raw values, validating both.
    ///
    /// Pure core of [`BackendConfig::from_env`]; `None` or a blank value
    /// counts as missing.
    pub fn from_values(
        base_url: Option<String>,
        anon_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar(BACKEND_URL_VAR.to_string()))?;
        let anon_key = anon_key
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar(ANON_KEY_VAR.to_string()))?;

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(base_url));
        }

        info!(backend = %base_url, "backend configuration loaded");
        Ok(Self {
            base_url,
            anon_key: anon_key.trim().to_string(),
        })
    }
}

/// Directory for local state. Honors `SMARTMARK_DATA_DIR`, falling back
/// to the working directory.
pub fn data_dir() -> PathBuf {
    match env::var(DATA_DIR_VAR) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("."),
    }
}
