//! LRS configuration
//!
//! Settings are read from the environment once, at startup. A missing
//! authentication token is fatal.

use crate::error::ConfigurationError;

/// Environment variable holding the LRS authentication token
pub const ENV_LRS_AUTH_TOKEN: &str = "POTSIE_LRS_AUTH_TOKEN";
/// Environment variable holding the LRS API base URL
pub const ENV_LRS_API_URL: &str = "POTSIE_LRS_API_URL";
/// Environment variable overriding the LRS request timeout (seconds)
pub const ENV_LRS_TIMEOUT: &str = "POTSIE_LRS_TIMEOUT";

/// Default LRS request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the Learning Record Store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrsConfig {
    /// Token sent as `Authorization: Basic <token>`
    pub auth_token: String,
    /// Base URL of the LRS API
    pub api_url: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl LrsConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth_token = lookup(ENV_LRS_AUTH_TOKEN)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigurationError::MissingVariable(ENV_LRS_AUTH_TOKEN))?;

        let api_url = lookup(ENV_LRS_API_URL)
            .filter(|v| !v.is_empty())
            .map(|v| v.trim_end_matches('/').to_string());

        let timeout_secs = match lookup(ENV_LRS_TIMEOUT) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigurationError::InvalidVariable {
                    name: ENV_LRS_TIMEOUT,
                    reason: e.to_string(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(LrsConfig {
            auth_token,
            api_url,
            timeout_secs,
        })
    }

    /// API base URL, required to reach the LRS
    pub fn require_api_url(&self) -> Result<&str, ConfigurationError> {
        self.api_url
            .as_deref()
            .ok_or(ConfigurationError::MissingVariable(ENV_LRS_API_URL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = LrsConfig::from_lookup(lookup(&[(ENV_LRS_API_URL, "http://lrs")])).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingVariable(ENV_LRS_AUTH_TOKEN));
        assert_eq!(
            err.to_string(),
            "POTSIE_LRS_AUTH_TOKEN environment variable should be defined"
        );
    }

    #[test]
    fn test_url_is_optional() {
        let config = LrsConfig::from_lookup(lookup(&[(ENV_LRS_AUTH_TOKEN, "secret")])).unwrap();

        assert_eq!(config.auth_token, "secret");
        assert_eq!(config.api_url, None);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.require_api_url().is_err());
    }

    #[test]
    fn test_full_config() {
        let config = LrsConfig::from_lookup(lookup(&[
            (ENV_LRS_AUTH_TOKEN, "secret"),
            (ENV_LRS_API_URL, "https://lrs.example.com/xAPI/"),
            (ENV_LRS_TIMEOUT, "5"),
        ]))
        .unwrap();

        assert_eq!(config.require_api_url().unwrap(), "https://lrs.example.com/xAPI");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_timeout() {
        let err = LrsConfig::from_lookup(lookup(&[
            (ENV_LRS_AUTH_TOKEN, "secret"),
            (ENV_LRS_TIMEOUT, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidVariable { .. }));
    }
}
