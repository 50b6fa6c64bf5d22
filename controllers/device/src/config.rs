//! Controller configuration loaded from environment variables.

use std::time::Duration;

use metal_client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

use crate::error::ControllerError;

/// Default requeue interval after a successful pass
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Equinix Metal API base URL
    pub metal_api_url: String,
    /// Requeue interval after a successful pass
    pub poll_interval: Duration,
    /// Per-request timeout for Metal API calls
    pub request_timeout: Duration,
}

impl Config {
    /// Reads `METAL_API_URL`, `POLL_INTERVAL_SECONDS` and
    /// `METAL_REQUEST_TIMEOUT_SECONDS`
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let metal_api_url = lookup("METAL_API_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !metal_api_url.starts_with("http://") && !metal_api_url.starts_with("https://") {
            return Err(ControllerError::InvalidConfig(format!(
                "METAL_API_URL must be an http(s) URL, got {}",
                metal_api_url
            )));
        }

        Ok(Self {
            metal_api_url: metal_api_url.trim_end_matches('/').to_string(),
            poll_interval: seconds(&lookup, "POLL_INTERVAL_SECONDS", DEFAULT_POLL_INTERVAL)?,
            request_timeout: seconds(&lookup, "METAL_REQUEST_TIMEOUT_SECONDS", DEFAULT_TIMEOUT)?,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ControllerError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key))),
        Ok(value) => Ok(Duration::from_secs(value)),
        Err(e) => Err(ControllerError::InvalidConfig(format!("{} must be a number of seconds: {}", key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.metal_api_url, "https://api.equinix.com/metal/v1");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("METAL_API_URL", "http://metal.local/v1/"),
            ("POLL_INTERVAL_SECONDS", "120"),
            ("METAL_REQUEST_TIMEOUT_SECONDS", " 10 "),
        ])
        .unwrap();
        assert_eq!(config.metal_api_url, "http://metal.local/v1");
        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("POLL_INTERVAL_SECONDS", "soon")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config(&[("METAL_REQUEST_TIMEOUT_SECONDS", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config(&[("METAL_API_URL", "ftp://metal")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
