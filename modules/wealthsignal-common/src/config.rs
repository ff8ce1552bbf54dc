use std::env;

use tracing::info;

use crate::error::WealthSignalError;
use crate::thresholds::DEFAULT_CONCURRENCY;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_EMAIL_FROM: &str = "WealthSignal <alerts@wealthsignal.local>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "production" || s == "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: Option<String>,

    // AI providers
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub voyage_api_key: String,

    // Search & fetch
    pub serper_api_key: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Delivery
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub push_webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,

    pub environment: Environment,
    pub concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WealthSignalError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WealthSignalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                WealthSignalError::Config(format!("{key} environment variable is required"))
            })
        };

        let concurrency = match optional("PIPELINE_CONCURRENCY") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                WealthSignalError::Config(format!("PIPELINE_CONCURRENCY must be a number, got {raw:?}"))
            })?,
            None => DEFAULT_CONCURRENCY,
        };
        if concurrency == 0 {
            return Err(WealthSignalError::Config(
                "PIPELINE_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            anthropic_api_key: required("ANTHROPIC_API_KEY")?,
            anthropic_model: optional("ANTHROPIC_MODEL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            voyage_api_key: required("VOYAGE_API_KEY")?,
            serper_api_key: optional("SERPER_API_KEY"),
            browserless_url: optional("BROWSERLESS_URL"),
            browserless_token: optional("BROWSERLESS_TOKEN"),
            resend_api_key: optional("RESEND_API_KEY"),
            email_from: optional("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            push_webhook_url: optional("PUSH_WEBHOOK_URL"),
            slack_webhook_url: optional("SLACK_WEBHOOK_URL"),
            environment: Environment::parse(optional("APP_ENV").as_deref()),
            concurrency,
        })
    }

    /// Log which settings are present without printing any secret.
    pub fn log_redacted(&self) {
        fn present<T>(v: &Option<T>) -> &'static str {
            if v.is_some() {
                "set"
            } else {
                "unset"
            }
        }
        info!(
            database_url = present(&self.database_url),
            anthropic_model = self.anthropic_model.as_str(),
            serper = present(&self.serper_api_key),
            browserless = present(&self.browserless_url),
            resend = present(&self.resend_api_key),
            push_webhook = present(&self.push_webhook_url),
            slack = present(&self.slack_webhook_url),
            environment = ?self.environment,
            concurrency = self.concurrency,
            "Configuration loaded"
        );
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
    fn missing_required_key_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("VOYAGE_API_KEY", "v")])).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn defaults_apply_for_optional_keys() {
        let config =
            Config::from_lookup(lookup(&[("ANTHROPIC_API_KEY", "a"), ("VOYAGE_API_KEY", "v")]))
                .unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database_url.is_none());
        assert!(config.serper_api_key.is_none());
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "a"),
            ("VOYAGE_API_KEY", "v"),
            ("SERPER_API_KEY", "   "),
            ("APP_ENV", "Production"),
        ]))
        .unwrap();
        assert!(config.serper_api_key.is_none());
        assert!(config.environment.is_production());
    }

    #[test]
    fn bad_concurrency_is_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("ANTHROPIC_API_KEY", "a"),
            ("VOYAGE_API_KEY", "v"),
            ("PIPELINE_CONCURRENCY", "lots"),
        ]));
        assert!(result.is_err());
    }
}
