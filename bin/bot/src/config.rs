//! Centralized bot configuration.
//!
//! Configuration is loaded via the `config` crate from environment
//! variables, using `__` to separate nested keys (`SMTP__HOST`,
//! `STORE__PATH`, ...). A `.env` file is read first when one exists.
//!
//! See [`StoreConfig`] and [`SmtpConfig`] for the store and email settings.

use gatehouse_notify::SmtpConfig;
use gatehouse_registry::StoreConfig;
use serde::Deserialize;
use std::fmt;

/// Bot configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct BotConfig {
    /// Driver store settings.
    pub store: StoreConfig,

    /// Outgoing email settings.
    pub smtp: SmtpConfig,

    /// Telegram Bot API settings.
    pub telegram: TelegramConfig,

    /// Upper bound on a single conversation turn, in seconds.
    #[serde(default = "default_turn_timeout_seconds")]
    pub turn_timeout_seconds: u64,
}

/// Telegram Bot API configuration.
#[derive(Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot access token issued by BotFather.
    pub token: String,

    /// Base URL of the Bot API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,
}

fn default_turn_timeout_seconds() -> u64 {
    30
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .finish()
    }
}

impl BotConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(environment())
    }

    fn load(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_notify::SmtpSecurity;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig, config::ConfigError> {
        let map = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        BotConfig::load(environment().source(Some(map)))
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("STORE__PATH", "/var/lib/gatehouse/drivers.db"),
        ("SMTP__USERNAME", "gate@example.com"),
        ("SMTP__PASSWORD", "hunter-two"),
        ("SMTP__RECIPIENT", "security@example.com"),
        ("TELEGRAM__TOKEN", "abc:def"),
    ];

    #[test]
    fn required_settings_with_defaults() {
        let config = load(REQUIRED).expect("config loads");

        assert_eq!(
            config.store.path,
            std::path::PathBuf::from("/var/lib/gatehouse/drivers.db")
        );
        assert_eq!(config.store.max_connections, 4);
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.security, SmtpSecurity::StartTls);
        assert_eq!(config.smtp.from, None);
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.telegram.poll_timeout_seconds, 30);
        assert_eq!(config.turn_timeout_seconds, 30);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("SMTP__HOST", "mail.example.com"),
            ("SMTP__PORT", "465"),
            ("SMTP__SECURITY", "implicit"),
            ("SMTP__FROM", "Gate <gate@example.com>"),
            ("TELEGRAM__POLL_TIMEOUT_SECONDS", "10"),
            ("TURN_TIMEOUT_SECONDS", "5"),
        ]);
        let config = load(&vars).expect("config loads");

        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.smtp.security, SmtpSecurity::Implicit);
        assert_eq!(config.smtp.from.as_deref(), Some("Gate <gate@example.com>"));
        assert_eq!(config.telegram.poll_timeout_seconds, 10);
        assert_eq!(config.turn_timeout_seconds, 5);
    }

    #[test]
    fn missing_token_is_an_error() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(key, _)| *key != "TELEGRAM__TOKEN")
            .collect();
        assert!(load(&vars).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(REQUIRED).expect("config loads");
        let debug = format!("{config:?}");
        assert!(!debug.contains("abc:def"));
        assert!(!debug.contains("hunter-two"));
    }
}
