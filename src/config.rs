//! config.rs - Runtime settings read from `APPRAISER_*` environment variables

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::snapshot::RefreshPolicy;
use crate::valuation::TraversalLimits;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_url: String,
    /// Live market prices instead of static base prices
    pub use_dynamic_prices: bool,
    pub refresh_policy: RefreshPolicy,
    pub limits: TraversalLimits,
    pub request_timeout: Duration,
    pub manual_refresh_cooldown: Duration,
    /// Spacing between automatic retries after a failed load
    pub min_retry_interval: Duration,
    pub background_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: "http://127.0.0.1:6969".to_string(),
            use_dynamic_prices: false,
            refresh_policy: RefreshPolicy::Permanent,
            limits: TraversalLimits::default(),
            request_timeout: Duration::from_secs(10),
            manual_refresh_cooldown: Duration::from_secs(5),
            min_retry_interval: Duration::from_secs(10),
            background_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let limits = TraversalLimits {
            max_depth: parse_or(&get, "APPRAISER_MAX_CONTAINER_DEPTH", defaults.limits.max_depth)?
                .clamp(1, 50),
            max_items: parse_or(&get, "APPRAISER_MAX_CONTAINER_ITEMS", defaults.limits.max_items)?
                .min(500),
            skip_large_containers: parse_bool_or(
                &get,
                "APPRAISER_SKIP_LARGE_CONTAINERS",
                defaults.limits.skip_large_containers,
            )?,
            large_container_threshold: parse_or(
                &get,
                "APPRAISER_LARGE_CONTAINER_THRESHOLD",
                defaults.limits.large_container_threshold,
            )?
            .clamp(10, 1000),
        };

        let refresh_policy = match get("APPRAISER_CACHE_MODE") {
            None => defaults.refresh_policy,
            Some(mode) => parse_cache_mode(&mode)?,
        };

        Ok(Config {
            server_url: get("APPRAISER_SERVER_URL").unwrap_or(defaults.server_url),
            use_dynamic_prices: parse_bool_or(
                &get,
                "APPRAISER_USE_DYNAMIC_PRICES",
                defaults.use_dynamic_prices,
            )?,
            refresh_policy,
            limits,
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "APPRAISER_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            manual_refresh_cooldown: Duration::from_secs(parse_or(
                &get,
                "APPRAISER_MANUAL_REFRESH_COOLDOWN_SECS",
                defaults.manual_refresh_cooldown.as_secs(),
            )?),
            min_retry_interval: Duration::from_secs(parse_or(
                &get,
                "APPRAISER_MIN_RETRY_SECS",
                defaults.min_retry_interval.as_secs(),
            )?),
            background_interval: Duration::from_secs(
                parse_or(
                    &get,
                    "APPRAISER_BACKGROUND_INTERVAL_SECS",
                    defaults.background_interval.as_secs(),
                )?
                .max(1),
            ),
        })
    }
}

fn parse_cache_mode(mode: &str) -> Result<RefreshPolicy, ConfigError> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "permanent" => Ok(RefreshPolicy::Permanent),
        "5m" => Ok(RefreshPolicy::FixedInterval(Duration::from_secs(5 * 60))),
        "10m" => Ok(RefreshPolicy::FixedInterval(Duration::from_secs(10 * 60))),
        "manual" => Ok(RefreshPolicy::ManualOnly),
        _ => Err(ConfigError::Invalid {
            key: "APPRAISER_CACHE_MODE",
            value: mode.to_string(),
            expected: "permanent, 5m, 10m or manual",
        }),
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value,
            expected: "a non-negative integer",
        }),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                expected: "true or false",
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.limits.max_depth, 10);
        assert_eq!(config.limits.large_container_threshold, 150);
    }

    #[test]
    fn test_reads_and_clamps_values() {
        let config = from_pairs(&[
            ("APPRAISER_SERVER_URL", "http://10.0.0.2:6969"),
            ("APPRAISER_USE_DYNAMIC_PRICES", "yes"),
            ("APPRAISER_CACHE_MODE", "10m"),
            ("APPRAISER_MAX_CONTAINER_DEPTH", "99"),
            ("APPRAISER_MAX_CONTAINER_ITEMS", "0"),
            ("APPRAISER_LARGE_CONTAINER_THRESHOLD", "3"),
            ("APPRAISER_SKIP_LARGE_CONTAINERS", "false"),
        ])
        .unwrap();

        assert_eq!(config.server_url, "http://10.0.0.2:6969");
        assert!(config.use_dynamic_prices);
        assert_eq!(
            config.refresh_policy,
            RefreshPolicy::FixedInterval(Duration::from_secs(600))
        );
        assert_eq!(config.limits.max_depth, 50);
        assert_eq!(config.limits.max_items, 0);
        assert_eq!(config.limits.large_container_threshold, 10);
        assert!(!config.limits.skip_large_containers);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = from_pairs(&[("APPRAISER_CACHE_MODE", "hourly")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "APPRAISER_CACHE_MODE",
                ..
            }
        ));

        let err = from_pairs(&[("APPRAISER_MAX_CONTAINER_DEPTH", "-3")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "APPRAISER_MAX_CONTAINER_DEPTH",
                ..
            }
        ));

        assert!(from_pairs(&[("APPRAISER_USE_DYNAMIC_PRICES", "maybe")]).is_err());
    }

    #[test]
    fn test_min_retry_interval() {
        assert_eq!(
            from_pairs(&[]).unwrap().min_retry_interval,
            Duration::from_secs(10)
        );
        let config = from_pairs(&[("APPRAISER_MIN_RETRY_SECS", "30")]).unwrap();
        assert_eq!(config.min_retry_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_manual_mode() {
        let config = from_pairs(&[("APPRAISER_CACHE_MODE", " Manual ")]).unwrap();
        assert_eq!(config.refresh_policy, RefreshPolicy::ManualOnly);
    }
}
