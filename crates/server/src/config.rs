//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHOREBOARD_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CHOREBOARD_SIGNING_SECRET` - Credential signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `CHOREBOARD_HOST` - Bind address (default: 127.0.0.1)
//! - `CHOREBOARD_PORT` - Listen port (default: 3002)
//! - `CHOREBOARD_CREDENTIAL_TTL_SECS` - Lifetime of minted credentials (default: 3600)
//! - `CHOREBOARD_TIMEZONE` - Zone the daily jobs are scheduled in (default: Europe/Helsinki)
//! - `CHOREBOARD_DUE_SOON_MINUTES` - Due-soon lookahead and scan cadence (default: 15)
//! - `CHOREBOARD_ROTATION_TIME` - Daily QR rotation, `HH:MM` local (default: 02:00)
//! - `CHOREBOARD_REPEAT_RULES_TIME` - Daily repeat-rule job, `HH:MM` local (default: 03:00)
//! - `CHOREBOARD_SCHEDULER_ENABLED` - Run scheduled jobs in-process (default: true)
//! - `CHOREBOARD_DEV_ENDPOINTS` - Expose provisioning and seeding routes (default: false)
//! - `CHOREBOARD_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (push gateway - notifications are logged and dropped without it)
//! - `PUSH_ENDPOINT` - Multicast endpoint URL
//! - `PUSH_API_KEY` - Bearer key for the gateway

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Credential signing secret
    pub signing_secret: SecretString,
    /// Lifetime of minted credentials
    pub credential_ttl: Duration,
    /// Scheduling settings
    pub schedule: ScheduleConfig,
    /// Expose provisioning and seeding routes
    pub dev_endpoints: bool,
    /// Push gateway (optional - notifications are dropped without it)
    pub push: Option<PushConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Scheduled job settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Run jobs inside the server process
    pub enabled: bool,
    /// Zone the daily jobs fire in
    pub timezone: Tz,
    /// Due-soon lookahead, also the scan cadence
    pub due_soon_minutes: u32,
    /// Local time of the daily QR rotation
    pub rotation_time: NaiveTime,
    /// Local time of the daily repeat-rule job
    pub repeat_rules_time: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: chrono_tz::Europe::Helsinki,
            due_soon_minutes: 15,
            rotation_time: NaiveTime::MIN + chrono::Duration::hours(2),
            repeat_rules_time: NaiveTime::MIN + chrono::Duration::hours(3),
        }
    }
}

/// Push gateway configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PushConfig {
    /// Multicast endpoint
    pub endpoint: Url,
    /// Bearer key
    pub api_key: SecretString,
}

impl std::fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl PushConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let endpoint = get_optional_env("PUSH_ENDPOINT");
        let api_key = get_optional_env("PUSH_API_KEY");

        match (endpoint, api_key) {
            (Some(endpoint), Some(key)) => {
                let endpoint = Url::parse(&endpoint).map_err(|e| {
                    ConfigError::InvalidEnvVar("PUSH_ENDPOINT".to_string(), e.to_string())
                })?;
                validate_secret_strength(&key, "PUSH_API_KEY")?;
                Ok(Some(Self {
                    endpoint,
                    api_key: SecretString::from(key),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PUSH_*".to_string(),
                "Both PUSH_ENDPOINT and PUSH_API_KEY must be set together".to_string(),
            )),
        }
    }
}

impl ScheduleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timezone = match get_optional_env("CHOREBOARD_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                ConfigError::InvalidEnvVar("CHOREBOARD_TIMEZONE".to_string(), e.to_string())
            })?,
            None => defaults.timezone,
        };
        let due_soon_minutes = get_env_or_default("CHOREBOARD_DUE_SOON_MINUTES", "15")
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=1440).contains(m))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "CHOREBOARD_DUE_SOON_MINUTES".to_string(),
                    "must be between 1 and 1440".to_string(),
                )
            })?;

        Ok(Self {
            enabled: parse_bool("CHOREBOARD_SCHEDULER_ENABLED", defaults.enabled)?,
            timezone,
            due_soon_minutes,
            rotation_time: parse_time("CHOREBOARD_ROTATION_TIME", defaults.rotation_time)?,
            repeat_rules_time: parse_time(
                "CHOREBOARD_REPEAT_RULES_TIME",
                defaults.repeat_rules_time,
            )?,
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHOREBOARD_DATABASE_URL")?;
        let host = get_env_or_default("CHOREBOARD_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHOREBOARD_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CHOREBOARD_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHOREBOARD_PORT".to_string(), e.to_string()))?;
        let signing_secret = get_validated_secret("CHOREBOARD_SIGNING_SECRET")?;
        validate_signing_secret(&signing_secret, "CHOREBOARD_SIGNING_SECRET")?;
        let credential_ttl = get_env_or_default("CHOREBOARD_CREDENTIAL_TTL_SECS", "3600")
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "CHOREBOARD_CREDENTIAL_TTL_SECS".to_string(),
                    "must be a positive number of seconds".to_string(),
                )
            })?;

        let schedule = ScheduleConfig::from_env()?;
        let dev_endpoints = parse_bool("CHOREBOARD_DEV_ENDPOINTS", false)?;
        let push = PushConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            signing_secret,
            credential_ttl,
            schedule,
            dev_endpoints,
            push,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the push gateway configuration, if available.
    #[must_use]
    pub const fn push(&self) -> Option<&PushConfig> {
        self.push.as_ref()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a boolean flag, accepting `true/false`, `1/0`, `yes/no`.
fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_env(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Parse an `HH:MM` local time.
fn parse_time(key: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_signing_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.len() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
