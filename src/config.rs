use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Path prefix every route is mounted under, without surrounding slashes.
    pub prefix: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ideas_ttl: Duration,
    pub status_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            prefix: "api/v1".to_string(),
            database_url: None,
            max_connections: 5,
            rate_limit: RateLimitConfig {
                requests: 12,
                window: Duration::from_secs(60),
            },
            cache: CacheConfig {
                ideas_ttl: Duration::from_secs(60),
                status_ttl: Duration::from_secs(30),
            },
        }
    }
}

impl Config {
    /// Read the configuration from the environment (after `.env`, if present, has been loaded).
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: try_load("PORT", defaults.port)?,
            prefix: env::var("PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.prefix),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_connections: try_load("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            rate_limit: RateLimitConfig {
                requests: try_load("RATE_LIMIT_REQUESTS", defaults.rate_limit.requests)?,
                window: Duration::from_secs(try_load(
                    "RATE_LIMIT_WINDOW_SECS",
                    defaults.rate_limit.window.as_secs(),
                )?),
            },
            cache: CacheConfig {
                ideas_ttl: Duration::from_secs(try_load(
                    "CACHE_TTL_IDEAS_SECS",
                    defaults.cache.ideas_ttl.as_secs(),
                )?),
                status_ttl: Duration::from_secs(try_load(
                    "CACHE_TTL_STATUS_SECS",
                    defaults.cache.status_ttl.as_secs(),
                )?),
            },
        })
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError {
                key,
                value,
                reason: e.to_string(),
            }
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.prefix, "api/v1");
        assert!(config.database_url.is_none());
        assert_eq!(config.rate_limit.requests, 12);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.cache.ideas_ttl, Duration::from_secs(60));
        assert_eq!(config.cache.status_ttl, Duration::from_secs(30));
    }

    #[test]
    fn try_load_parses_or_rejects() {
        env::set_var("IDEA_POLL_TEST_GOOD", " 42 ");
        env::set_var("IDEA_POLL_TEST_BAD", "forty-two");

        assert_eq!(try_load("IDEA_POLL_TEST_GOOD", 1u32).unwrap(), 42);
        assert_eq!(try_load("IDEA_POLL_TEST_UNSET", 7u32).unwrap(), 7);

        let err = try_load("IDEA_POLL_TEST_BAD", 1u32).unwrap_err();
        assert!(err.to_string().contains("IDEA_POLL_TEST_BAD"));
    }
}
