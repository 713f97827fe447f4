//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `POMELO_API_BASE_URL` - Base URL of the order-management backend
//!
//! ## Optional
//! - `POMELO_API_TOKEN` - Bearer token for the backend
//! - `POMELO_CACHE_PATH` - Path to the persistent cache file (default:
//!   in-memory cache when unset)
//! - `POMELO_SYNC_INTERVAL_MS` - Cart synchronizer poll interval in
//!   milliseconds (default: 500). Consumed by embedders that run
//!   [`crate::sync::spawn`]; one-shot processes have nothing to
//!   synchronize and ignore it.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default cart synchronizer poll interval.
const DEFAULT_SYNC_INTERVAL_MS: u64 = 500;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Order-management backend configuration.
    pub api: ApiConfig,
    /// Path to the persistent cache file. `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,
    /// Cart synchronizer poll interval, for embedders that run
    /// [`crate::sync::spawn`] alongside a long-lived session.
    pub sync_interval: Duration,
}

/// Order-management backend configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL of the backend.
    pub base_url: Url,
    /// Bearer token, if the backend requires one.
    pub token: Option<SecretString>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "token",
                &self.token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_required_env("POMELO_API_BASE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("POMELO_API_BASE_URL".to_string(), e.to_string())
            })?;
        let token = get_optional_env("POMELO_API_TOKEN").map(SecretString::from);
        let cache_path = get_optional_env("POMELO_CACHE_PATH").map(PathBuf::from);
        let sync_interval_ms = get_env_or_default(
            "POMELO_SYNC_INTERVAL_MS",
            &DEFAULT_SYNC_INTERVAL_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("POMELO_SYNC_INTERVAL_MS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api: ApiConfig { base_url, token },
            cache_path,
            sync_interval: Duration::from_millis(sync_interval_ms),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_debug_redacts_token() {
        let config = ApiConfig {
            base_url: "https://api.example.com/".parse().unwrap(),
            token: Some(SecretString::from("super_secret_token")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://api.example.com/"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token"));
    }

    #[test]
    fn test_default_sync_interval() {
        assert_eq!(DEFAULT_SYNC_INTERVAL_MS, 500);
    }
}
