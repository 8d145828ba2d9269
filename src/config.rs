//! Process-wide configuration, read once from the environment at startup.

use std::env;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_MAX_RESULTS: u8 = 10;
const DEFAULT_DEPTH: u8 = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Secret that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub serper_api_key: Option<ApiKey>,
    pub tavily_api_key: Option<ApiKey>,
    pub gemini_api_key: Option<ApiKey>,
    pub gemini_model: String,
    pub max_search_results: u8,
    pub default_search_depth: u8,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let key = |name: &str| lookup(name).and_then(|v| ApiKey::new(&v));

        let gemini_model = lookup("GEMINI_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let max_search_results =
            parse_number(&lookup, "MAX_SEARCH_RESULTS", u64::from(DEFAULT_MAX_RESULTS))?;
        let default_search_depth =
            parse_number(&lookup, "DEFAULT_SEARCH_DEPTH", u64::from(DEFAULT_DEPTH))?;
        let timeout_secs =
            parse_number(&lookup, "REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("REQUEST_TIMEOUT"));
        }

        Ok(Self {
            serper_api_key: key("SERPER_API_KEY"),
            tavily_api_key: key("TAVILY_API_KEY"),
            gemini_api_key: key("GEMINI_API_KEY"),
            gemini_model,
            max_search_results: saturate_u8(max_search_results),
            default_search_depth: saturate_u8(default_search_depth),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn has_search_key(&self) -> bool {
        self.serper_api_key.is_some() || self.tavily_api_key.is_some()
    }
}

fn parse_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}

fn saturate_u8(n: u64) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert!(config.serper_api_key.is_none());
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.max_search_results, 10);
        assert_eq!(config.default_search_depth, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.has_search_key());
    }

    #[test]
    fn blank_keys_are_treated_as_missing() {
        let config = config_from(&[("SERPER_API_KEY", "   "), ("TAVILY_API_KEY", "tv-1")]).unwrap();
        assert!(config.serper_api_key.is_none());
        assert_eq!(config.tavily_api_key.unwrap().expose(), "tv-1");
    }

    #[test]
    fn reads_numeric_overrides() {
        let config = config_from(&[
            ("MAX_SEARCH_RESULTS", "15"),
            ("DEFAULT_SEARCH_DEPTH", " 2 "),
            ("REQUEST_TIMEOUT", "5"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
        ])
        .unwrap();
        assert_eq!(config.max_search_results, 15);
        assert_eq!(config.default_search_depth, 2);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = config_from(&[("MAX_SEARCH_RESULTS", "ten")]).unwrap_err();
        assert!(err.to_string().contains("MAX_SEARCH_RESULTS"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = config_from(&[("REQUEST_TIMEOUT", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Zero("REQUEST_TIMEOUT")));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("secret-value").unwrap();
        assert_eq!(format!("{key:?}"), "[REDACTED]");
    }
}
