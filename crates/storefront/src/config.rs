//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KRON_API_URL` - GraphQL endpoint of the storefront backend
//!
//! ## Optional
//! - `KRON_DEFAULT_REGION_ID` - Region for guest sessions when none is stored
//! - `KRON_API_TIMEOUT_SECS` - HTTP request timeout (default: 15)
//! - `KRON_QUERY_CACHE_TTL_SECS` - Product query cache TTL (default: 300)
//! - `KRON_QUERY_CACHE_CAPACITY` - Product query cache size (default: 1000)
//! - `KRON_RETRY_ATTEMPTS` - Attempts per request on transient failure (default: 3)
//! - `KRON_RETRY_BASE_DELAY_MS` - First backoff delay (default: 200)
//! - `KRON_NOTIFICATION_WINDOW_SECS` - Duplicate notification window (default: 10)
//! - `KRON_SEARCH_DICTIONARY` - JSON dictionary replacing the built-in one
//! - `KRON_STORAGE_DIR` - Directory for persisted client state (default: .kron)

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kron_core::RegionId;
use thiserror::Error;
use url::Url;

use crate::api::RetryPolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Storefront API configuration
    pub api: ApiConfig,
    /// Window in which repeated notifications are suppressed
    pub notification_window: Duration,
    /// Search dictionary overriding the built-in one
    pub search_dictionary: Option<PathBuf>,
    /// Directory for persisted client state
    pub storage_dir: PathBuf,
}

/// Storefront API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// GraphQL endpoint
    pub url: Url,
    /// Region used for guest login when no region is stored
    pub default_region_id: Option<RegionId>,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Product query cache TTL
    pub cache_ttl: Duration,
    /// Product query cache capacity, in entries
    pub cache_capacity: u64,
    /// Backoff for transient failures
    pub retry: RetryPolicy,
}

impl ApiConfig {
    /// Configuration for `url` with default settings.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            default_region_id: None,
            timeout: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1000,
            retry: RetryPolicy::default(),
        }
    }
}

impl StorefrontConfig {
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

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = get_required_env(&env, "KRON_API_URL")?;
        let url = Url::parse(&url)
            .map_err(|e| ConfigError::InvalidEnvVar("KRON_API_URL".to_string(), e.to_string()))?;

        let api = ApiConfig {
            url,
            default_region_id: get_optional_env(&env, "KRON_DEFAULT_REGION_ID").map(RegionId::from),
            timeout: Duration::from_secs(get_positive(&env, "KRON_API_TIMEOUT_SECS", 15)?),
            cache_ttl: Duration::from_secs(get_parsed(&env, "KRON_QUERY_CACHE_TTL_SECS", 300)?),
            cache_capacity: get_positive(&env, "KRON_QUERY_CACHE_CAPACITY", 1000)?,
            retry: RetryPolicy {
                max_attempts: get_positive(&env, "KRON_RETRY_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(get_parsed(
                    &env,
                    "KRON_RETRY_BASE_DELAY_MS",
                    200,
                )?),
            },
        };

        Ok(Self {
            api,
            notification_window: Duration::from_secs(get_parsed(
                &env,
                "KRON_NOTIFICATION_WINDOW_SECS",
                10,
            )?),
            search_dictionary: get_optional_env(&env, "KRON_SEARCH_DICTIONARY").map(PathBuf::from),
            storage_dir: PathBuf::from(get_env_or_default(&env, "KRON_STORAGE_DIR", ".kron")),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional_env(env, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(env: impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(env, key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed<T>(env: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_optional_env(env, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Like [`get_parsed`], rejecting zero.
fn get_positive<T>(env: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let value = get_parsed(env, key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("KRON_API_URL", "https://api.kron.test/graphql")]).unwrap();

        assert_eq!(config.api.url.as_str(), "https://api.kron.test/graphql");
        assert_eq!(config.api.default_region_id, None);
        assert_eq!(config.api.timeout, Duration::from_secs(15));
        assert_eq!(config.api.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.api.cache_capacity, 1000);
        assert_eq!(config.api.retry, RetryPolicy::default());
        assert_eq!(config.notification_window, Duration::from_secs(10));
        assert_eq!(config.search_dictionary, None);
        assert_eq!(config.storage_dir, PathBuf::from(".kron"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("KRON_API_URL", "https://api.kron.test/graphql"),
            ("KRON_DEFAULT_REGION_ID", "msk"),
            ("KRON_API_TIMEOUT_SECS", "30"),
            ("KRON_RETRY_ATTEMPTS", "5"),
            ("KRON_RETRY_BASE_DELAY_MS", "50"),
            ("KRON_NOTIFICATION_WINDOW_SECS", "0"),
            ("KRON_SEARCH_DICTIONARY", "/etc/kron/dictionary.json"),
        ])
        .unwrap();

        assert_eq!(config.api.default_region_id, Some(RegionId::new("msk")));
        assert_eq!(config.api.timeout, Duration::from_secs(30));
        assert_eq!(config.api.retry.max_attempts, 5);
        assert_eq!(config.api.retry.base_delay, Duration::from_millis(50));
        assert_eq!(config.notification_window, Duration::ZERO);
        assert_eq!(
            config.search_dictionary,
            Some(PathBuf::from("/etc/kron/dictionary.json"))
        );
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "KRON_API_URL"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = load(&[("KRON_API_URL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_invalid_url() {
        let err = load(&[("KRON_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "KRON_API_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[
            ("KRON_API_URL", "https://api.kron.test/graphql"),
            ("KRON_API_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid environment variable KRON_API_TIMEOUT_SECS: invalid digit found in string"
        );
    }

    #[test]
    fn test_zero_rejected_where_positive_required() {
        let err = load(&[
            ("KRON_API_URL", "https://api.kron.test/graphql"),
            ("KRON_RETRY_ATTEMPTS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "KRON_RETRY_ATTEMPTS"));
    }
}
