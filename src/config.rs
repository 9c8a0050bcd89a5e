//! Configuration loader for the `tankage-metrics` dashboard service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate reads `env::var`
//! directly; the cache, the HTTP backend and the routes receive a [`Config`].
//!
use std::{env, time::Duration};

use anyhow::{anyhow, bail, Result};

use crate::cache::{CachePolicy, RetryPolicy};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional float environment variable with a default value.
macro_rules! parse_env_f64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<f64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the tankage REST backend (e.g. `http://backend:3000`).
    pub api_url: String,

    /// Bearer token forwarded to the backend, if any.
    pub api_token: Option<String>,

    /// Port the dashboard API listens on.
    pub listen_port: u16,

    /// Seconds a cached resource is served without refetching.
    pub cache_fresh_secs: u32,

    /// Seconds after which the background revalidator refetches a resource.
    pub cache_revalidate_secs: u32,

    /// Seconds without a read after which a cached resource is dropped.
    pub cache_idle_secs: u32,

    /// Upper bound on the number of cached resources.
    pub cache_max_entries: u32,

    /// Retries for transient fetch failures (network errors, 5xx).
    pub fetch_max_retries: u32,

    /// First retry delay in milliseconds; doubles on each attempt.
    pub fetch_retry_base_ms: u32,

    /// Per-request timeout against the backend.
    pub http_timeout_secs: u32,

    /// Absolute difference below which two samples count as a stable trend.
    pub trend_epsilon: f64,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DASHBOARD_API_URL` – tankage backend base URL
///
/// Optional:
/// - `DASHBOARD_API_TOKEN` – bearer token for the backend
/// - `LISTEN_PORT` – HTTP port (default: 8080)
/// - `CACHE_FRESH_SECS` – freshness window (default: 60)
/// - `CACHE_REVALIDATE_SECS` – background revalidation interval (default: 300)
/// - `CACHE_IDLE_SECS` – drop resources unread for this long (default: 900)
/// - `CACHE_MAX_ENTRIES` – cached resource limit (default: 512)
/// - `FETCH_MAX_RETRIES` – transient failure retries (default: 3)
/// - `FETCH_RETRY_BASE_MS` – first backoff delay (default: 250)
/// - `HTTP_TIMEOUT_SECS` – backend request timeout (default: 10)
/// - `TREND_EPSILON` – stable-trend tolerance (default: 0.1)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let api_url = require_env!("DASHBOARD_API_URL");
    let api_token = env::var("DASHBOARD_API_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let listen_port = parse_env_u32!("LISTEN_PORT", 8080);
    let cache_fresh_secs = parse_env_u32!("CACHE_FRESH_SECS", 60);
    let cache_revalidate_secs = parse_env_u32!("CACHE_REVALIDATE_SECS", 300);
    let cache_idle_secs = parse_env_u32!("CACHE_IDLE_SECS", 900);
    let cache_max_entries = parse_env_u32!("CACHE_MAX_ENTRIES", 512);
    let fetch_max_retries = parse_env_u32!("FETCH_MAX_RETRIES", 3);
    let fetch_retry_base_ms = parse_env_u32!("FETCH_RETRY_BASE_MS", 250);
    let http_timeout_secs = parse_env_u32!("HTTP_TIMEOUT_SECS", 10);
    let trend_epsilon = parse_env_f64!("TREND_EPSILON", 0.1);

    let listen_port =
        u16::try_from(listen_port).map_err(|_| anyhow!("Invalid LISTEN_PORT: {}", listen_port))?;

    let cfg = Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        api_token,
        listen_port,
        cache_fresh_secs,
        cache_revalidate_secs,
        cache_idle_secs,
        cache_max_entries,
        fetch_max_retries,
        fetch_retry_base_ms,
        http_timeout_secs,
        trend_epsilon,
    };
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    // ---
    /// Reject combinations that cannot work together.
    pub fn validate(&self) -> Result<()> {
        // ---
        if self.api_url.is_empty() {
            bail!("DASHBOARD_API_URL must not be empty");
        }
        if self.cache_revalidate_secs < self.cache_fresh_secs {
            bail!(
                "CACHE_REVALIDATE_SECS ({}) must not be shorter than CACHE_FRESH_SECS ({})",
                self.cache_revalidate_secs,
                self.cache_fresh_secs
            );
        }
        if self.cache_idle_secs < self.cache_fresh_secs {
            bail!(
                "CACHE_IDLE_SECS ({}) must not be shorter than CACHE_FRESH_SECS ({})",
                self.cache_idle_secs,
                self.cache_fresh_secs
            );
        }
        if self.cache_max_entries == 0 {
            bail!("CACHE_MAX_ENTRIES must be at least 1");
        }
        if !self.trend_epsilon.is_finite() || self.trend_epsilon < 0.0 {
            bail!("TREND_EPSILON must be a non-negative number");
        }
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        // ---
        CachePolicy {
            fresh_for: Duration::from_secs(u64::from(self.cache_fresh_secs)),
            revalidate_every: Duration::from_secs(u64::from(self.cache_revalidate_secs)),
            idle_for: Duration::from_secs(u64::from(self.cache_idle_secs)),
            max_entries: usize::try_from(self.cache_max_entries).unwrap_or(usize::MAX),
            retry: RetryPolicy {
                max_retries: self.fetch_max_retries,
                base_delay: Duration::from_millis(u64::from(self.fetch_retry_base_ms)),
                ..RetryPolicy::default()
            },
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.http_timeout_secs))
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the backend token while showing all configuration values that
    /// were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_token = match &self.api_token {
            Some(token) if token.chars().count() > 4 => {
                let tail: String = token.chars().skip(token.chars().count() - 4).collect();
                format!("****{}", tail)
            }
            Some(_) => "****".to_string(),
            None => "(none)".to_string(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DASHBOARD_API_URL     : {}", self.api_url);
        tracing::info!("  DASHBOARD_API_TOKEN   : {}", masked_token);
        tracing::info!("  LISTEN_PORT           : {}", self.listen_port);
        tracing::info!("  CACHE_FRESH_SECS      : {}", self.cache_fresh_secs);
        tracing::info!("  CACHE_REVALIDATE_SECS : {}", self.cache_revalidate_secs);
        tracing::info!("  CACHE_IDLE_SECS       : {}", self.cache_idle_secs);
        tracing::info!("  CACHE_MAX_ENTRIES     : {}", self.cache_max_entries);
        tracing::info!("  FETCH_MAX_RETRIES     : {}", self.fetch_max_retries);
        tracing::info!("  FETCH_RETRY_BASE_MS   : {}", self.fetch_retry_base_ms);
        tracing::info!("  HTTP_TIMEOUT_SECS     : {}", self.http_timeout_secs);
        tracing::info!("  TREND_EPSILON         : {}", self.trend_epsilon);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sample_config() -> Config {
        // ---
        Config {
            api_url: "http://backend:3000".to_string(),
            api_token: None,
            listen_port: 8080,
            cache_fresh_secs: 60,
            cache_revalidate_secs: 300,
            cache_idle_secs: 900,
            cache_max_entries: 512,
            fetch_max_retries: 3,
            fetch_retry_base_ms: 250,
            http_timeout_secs: 10,
            trend_epsilon: 0.1,
        }
    }

    #[test]
    fn test_defaults_validate() {
        // ---
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_revalidate_shorter_than_fresh_rejected() {
        // ---
        let cfg = Config {
            cache_fresh_secs: 120,
            cache_revalidate_secs: 60,
            ..sample_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unusable_cache_bounds_rejected() {
        // ---
        let short_idle = Config {
            cache_idle_secs: 30,
            ..sample_config()
        };
        assert!(short_idle.validate().is_err());

        let no_entries = Config {
            cache_max_entries: 0,
            ..sample_config()
        };
        assert!(no_entries.validate().is_err());
    }

    #[test]
    fn test_negative_epsilon_rejected() {
        // ---
        let cfg = Config {
            trend_epsilon: -1.0,
            ..sample_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_cache_policy_from_config() {
        // ---
        let policy = sample_config().cache_policy();
        assert_eq!(policy.fresh_for, Duration::from_secs(60));
        assert_eq!(policy.revalidate_every, Duration::from_secs(300));
        assert_eq!(policy.idle_for, Duration::from_secs(900));
        assert_eq!(policy.max_entries, 512);
        assert_eq!(policy.retry.max_retries, 3);
        assert_eq!(policy.retry.base_delay, Duration::from_millis(250));
    }
}
