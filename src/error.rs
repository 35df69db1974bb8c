//! error.rs - Error types for the appraisal core
//!
//! Fetch failures never reach valuation callers: the caches swallow them and
//! report a boolean. Only the manual refresh path and configuration loading
//! surface typed errors.

use std::time::Duration;
use thiserror::Error;

/// Failure while talking to the remote price provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("could not decode {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{endpoint} returned an empty body")]
    EmptyResponse { endpoint: String },

    /// Used by non-HTTP sources (mocks, host bridges)
    #[error("price source unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an explicitly requested refresh
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("manual refresh requested too soon, retry in {}ms", .remaining.as_millis())]
    Debounced { remaining: Duration },

    #[error("refresh failed: {0}")]
    Failed(String),
}

/// Invalid configuration value
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounced_message_mentions_remaining_time() {
        let err = RefreshError::Debounced {
            remaining: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "manual refresh requested too soon, retry in 1500ms"
        );
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::Invalid {
            key: "APPRAISER_CACHE_MODE",
            value: "hourly".to_string(),
            expected: "permanent, 5m, 10m or manual",
        };
        assert!(err.to_string().contains("APPRAISER_CACHE_MODE"));
        assert!(err.to_string().contains("hourly"));
    }
}
