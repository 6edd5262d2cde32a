use std::time::Duration;

use tracing::info;

use crate::error::{ChartError, Result};

pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2.5";
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.exa.ai";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Process-wide settings, read once at startup and never mutated.
#[derive(Clone)]
pub struct Config {
    pub openrouter_api_key: Option<String>,
    pub exa_api_key: Option<String>,
    pub model: String,
    pub completion_base_url: String,
    pub search_base_url: String,
    pub request_timeout: Duration,
    pub port: u16,
}

/// Both upstream credentials, present and non-empty.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub openrouter: &'a str,
    pub exa: &'a str,
}

impl Config {
    /// Loads `.env` (if any) and then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        info!(
            model = %config.model,
            port = config.port,
            has_keys = config.credentials().is_ok(),
            "Configuration loaded"
        );
        config
    }

    /// Builds a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            exa_api_key: get("EXA_API_KEY"),
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_base_url: get("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_BASE_URL.to_string()),
            search_base_url: get("EXA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(
                get("REQUEST_TIMEOUT_SECS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            port: get("PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }

    pub fn credentials(&self) -> Result<Credentials<'_>> {
        match (&self.openrouter_api_key, &self.exa_api_key) {
            (Some(openrouter), Some(exa)) => Ok(Credentials { openrouter, exa }),
            _ => Err(ChartError::Configuration),
        }
    }
}

// Keys stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("has_openrouter_key", &self.openrouter_api_key.is_some())
            .field("has_exa_key", &self.exa_api_key.is_some())
            .field("model", &self.model)
            .field("completion_base_url", &self.completion_base_url)
            .field("search_base_url", &self.search_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.port, 8787);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(matches!(config.credentials(), Err(ChartError::Configuration)));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-or"),
            ("EXA_API_KEY", "  "),
        ]));
        assert!(config.credentials().is_err());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-or"),
            ("EXA_API_KEY", "exa"),
            ("OPENROUTER_MODEL", "openai/gpt-4o"),
            ("PORT", "9000"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ]));
        let creds = config.credentials().unwrap();
        assert_eq!(creds.openrouter, "sk-or");
        assert_eq!(creds.exa, "exa");
        assert_eq!(config.model, "openai/gpt-4o");
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_output_hides_keys() {
        let config = Config::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-secret")]));
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
    }
}
