//! Configuration module for Media Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! # Example
//!
//! ```yaml
//! storage:
//!   backend: http
//!   endpoint: "${STORAGE_ENDPOINT:-http://localhost:9000}"
//!   public_base_url: "https://cdn.example.com"
//!   token: "${STORAGE_TOKEN}"
//! upload:
//!   progress_interval_ms: 200
//!   progress_step: 10
//!   progress_cap: 90
//!   transfer_timeout_secs: 120
//! identity:
//!   jwt_secret: "${SESSION_SECRET}"
//! policies:
//!   avatar:
//!     bucket: "agent-avatars"
//!     max_bytes: 1048576
//! ```

use crate::policy::{PolicyOverrides, Purpose};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static! {
    static ref ENV_VAR: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
fn expand_env_vars(s: &str) -> String {
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in ENV_VAR.captures_iter(s) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub identity: Option<IdentityConfig>,
    /// Per-purpose overrides layered over the built-in policies
    #[serde(default)]
    pub policies: HashMap<Purpose, PolicyOverrides>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Overrides configured for a purpose, empty if none
    pub fn policy_overrides(&self, purpose: Purpose) -> PolicyOverrides {
        self.policies.get(&purpose).cloned().unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Http {
            if !is_valid_http_url(&self.storage.endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid storage endpoint '{}': must start with http:// or https://",
                    self.storage.endpoint
                )));
            }
            if let Some(public) = &self.storage.public_base_url {
                if !is_valid_http_url(public) {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid public_base_url '{}': must start with http:// or https://",
                        public
                    )));
                }
            }
        }

        if self.upload.progress_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "progress_interval_ms must be greater than 0".into(),
            ));
        }
        if self.upload.progress_step == 0 {
            return Err(ConfigError::ValidationError(
                "progress_step must be greater than 0".into(),
            ));
        }
        if self.upload.progress_cap >= 100 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid progress_cap {}: must be below 100",
                self.upload.progress_cap
            )));
        }
        if self.upload.transfer_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transfer_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(identity) = &self.identity {
            if identity.jwt_secret.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "identity.jwt_secret cannot be empty".into(),
                ));
            }
        }

        for (purpose, overrides) in &self.policies {
            if overrides.max_bytes == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "Policy '{}' has max_bytes of 0",
                    purpose
                )));
            }
            if overrides.max_items == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "Policy '{}' has max_items of 0",
                    purpose
                )));
            }
            if let Some(bucket) = &overrides.bucket {
                if bucket.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "Policy '{}' has an empty bucket",
                        purpose
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Http,
    #[default]
    Memory,
}

/// Object storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Upload pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Synthetic progress tick period
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Percentage points added per tick
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    /// Highest synthetic progress before the transfer resolves
    #[serde(default = "default_progress_cap")]
    pub progress_cap: u8,
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

impl UploadConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            progress_step: default_progress_step(),
            progress_cap: default_progress_cap(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

fn default_progress_interval_ms() -> u64 {
    200
}

fn default_progress_step() -> u8 {
    10
}

fn default_progress_cap() -> u8 {
    90
}

fn default_transfer_timeout_secs() -> u64 {
    120
}

/// Session identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.upload.progress_step, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_backend_requires_endpoint() {
        let config = Config {
            storage: StorageConfig {
                backend: StorageBackend::Http,
                endpoint: "localhost:9000".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_progress_cap_must_stay_below_100() {
        let mut config = Config::default();
        config.upload.progress_cap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_bytes_override_rejected() {
        let mut config = Config::default();
        config.policies.insert(
            Purpose::Media,
            PolicyOverrides {
                max_bytes: Some(0),
                ..Default::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("media"));
    }

    #[test]
    fn test_expand_with_default() {
        let expanded = expand_env_vars("${MEDIA_UPLOADR_SURELY_UNSET:-fallback}");
        assert_eq!(expanded, "fallback");
    }

    #[test]
    fn test_expand_keeps_unknown_placeholder() {
        let expanded = expand_env_vars("a-${MEDIA_UPLOADR_SURELY_UNSET}-b");
        assert_eq!(expanded, "a-${MEDIA_UPLOADR_SURELY_UNSET}-b");
    }
}
