use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Runtime settings for the mock server binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// When set, pending networking actions are applied on this period.
    /// Otherwise only `POST /networking/apply` applies them.
    pub apply_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            apply_interval: None,
        }
    }
}

impl Config {
    /// Read `PORT` and `HIL_APPLY_INTERVAL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: port })?;
        }
        if let Some(ms) = lookup("HIL_APPLY_INTERVAL_MS") {
            let millis: u64 = ms.parse().map_err(|_| ConfigError::Invalid {
                var: "HIL_APPLY_INTERVAL_MS",
                value: ms.clone(),
            })?;
            config.apply_interval = (millis > 0).then(|| Duration::from_millis(millis));
        }
        Ok(config)
    }
}
