//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BUCKYDROP_APP_CODE` - Aggregator application code
//! - `BUCKYDROP_APP_SECRET` - Aggregator signing secret
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 3000)
//! - `DATABASE_URL` - `PostgreSQL` connection string for product facts.
//!   Without it every product uses default weight and dimensions.
//! - `BUCKYDROP_BASE_URL` - Aggregator origin (default: <https://bdopenapi.buckydrop.com>)
//! - `BUCKYDROP_API_PATH` - Channel list path
//! - `BUCKYDROP_TIMEOUT_SECS` - Aggregator timeout (default: 30)
//! - `RATE_CACHE_TTL_SECS` - Rendered-rate cache lifetime (default: 300)
//! - `RATE_CACHE_CAPACITY` - Maximum cached carts (default: 10000)
//! - `CARRIER_DEADLINE_MS` - Budget for answering checkout (default: 8000)
//! - `SHOPIFY_API_SECRET` - Enables `X-Shopify-Hmac-Sha256` verification
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://bdopenapi.buckydrop.com";
const DEFAULT_API_PATH: &str = "api/rest/v2/adapt/adaptation/logistics/channel-carriage-list";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Freight aggregator settings
    pub freight: FreightConfig,
    /// Quote cache and deadline settings
    pub rates: RatesConfig,
    /// Shopify app secret used to verify callback signatures
    pub shopify_api_secret: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("freight", &self.freight)
            .field("rates", &self.rates)
            .field(
                "shopify_api_secret",
                &self.shopify_api_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

/// Freight aggregator configuration.
#[derive(Clone)]
pub struct FreightConfig {
    pub base_url: String,
    pub api_path: String,
    pub app_code: String,
    pub app_secret: SecretString,
    pub timeout: Duration,
}

impl std::fmt::Debug for FreightConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreightConfig")
            .field("base_url", &self.base_url)
            .field("api_path", &self.api_path)
            .field("app_code", &self.app_code)
            .field("app_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Rate computation settings.
#[derive(Debug, Clone)]
pub struct RatesConfig {
    /// Lifetime of a cached rate response
    pub cache_ttl: Duration,
    /// Maximum number of cached responses
    pub cache_capacity: u64,
    /// Time budget for answering a checkout callback
    pub deadline: Duration,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            deadline: Duration::from_millis(8_000),
        }
    }
}

impl AppConfig {
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

        let host = parse_env_or_default::<IpAddr>("HOST", "0.0.0.0")?;
        let port = parse_env_or_default::<u16>("PORT", "3000")?;
        let database_url = get_optional_env("DATABASE_URL").map(SecretString::from);

        let freight = FreightConfig::from_env()?;
        let rates = RatesConfig::from_env()?;

        let shopify_api_secret = get_optional_env("SHOPIFY_API_SECRET").map(|secret| {
            warn_if_weak(&secret, "SHOPIFY_API_SECRET");
            SecretString::from(secret)
        });

        Ok(Self {
            host,
            port,
            database_url,
            freight,
            rates,
            shopify_api_secret,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl FreightConfig {
    /// Load aggregator settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if credentials are missing or the timeout is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_code = get_required_env("BUCKYDROP_APP_CODE")?;
        let app_secret = get_required_env("BUCKYDROP_APP_SECRET")?;
        warn_if_weak(&app_secret, "BUCKYDROP_APP_SECRET");

        Ok(Self {
            base_url: get_env_or_default("BUCKYDROP_BASE_URL", DEFAULT_BASE_URL),
            api_path: get_env_or_default("BUCKYDROP_API_PATH", DEFAULT_API_PATH),
            app_code,
            app_secret: SecretString::from(app_secret),
            timeout: Duration::from_secs(parse_env_or_default("BUCKYDROP_TIMEOUT_SECS", "30")?),
        })
    }
}

impl RatesConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs: u64 = parse_env_or_default("RATE_CACHE_TTL_SECS", "300")?;
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "RATE_CACHE_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            cache_ttl: Duration::from_secs(ttl_secs),
            cache_capacity: parse_env_or_default("RATE_CACHE_CAPACITY", "10000")?,
            deadline: Duration::from_millis(parse_env_or_default("CARRIER_DEADLINE_MS", "8000")?),
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Secrets issued by third parties are used as-is; a weak one is only logged.
fn warn_if_weak(secret: &str, var_name: &str) {
    if let Err(e) = validate_secret_strength(secret, var_name) {
        tracing::warn!("{e}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-app-secret", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_hex_secret() {
        // Aggregator secrets are 32 hex characters
        let result = validate_secret_strength("9f86d081884c7d659a2feaa0c55ad015", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_freight_config_debug_redacts_secret() {
        let config = FreightConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            app_code: "app-123".to_string(),
            app_secret: SecretString::from("9f86d081884c7d659a2feaa0c55ad015"),
            timeout: Duration::from_secs(30),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("9f86d081"));
    }

    #[test]
    fn test_rates_config_defaults() {
        let rates = RatesConfig::default();
        assert_eq!(rates.cache_ttl, Duration::from_secs(300));
        assert_eq!(rates.deadline, Duration::from_millis(8_000));
    }

    #[test]
    fn test_parse_env_or_default_uses_default() {
        let port: u16 = parse_env_or_default("CARRIER_RATES_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(port, 3000);
    }
}
