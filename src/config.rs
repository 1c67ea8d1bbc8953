//! Server configuration: defaults, optional TOML file, environment overrides.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Runtime settings for the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,
    /// Port to bind.
    port: u16,
    /// SQLite database path.
    database_url: String,
    /// Seconds a lone player waits before getting a bot.
    matchmaking_timeout_secs: u64,
    /// Seconds between stale wait-set sweeps.
    sweep_interval_secs: u64,
    /// Bot "thinking" delay in milliseconds.
    bot_move_delay_ms: u64,
    /// Delay before pushing the start state to the waiting opponent.
    opponent_notify_delay_ms: u64,
    /// Seconds between keep-alive pings.
    heartbeat_interval_secs: u64,
    /// Emit analytics events through the tracing sink.
    analytics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "four_in_a_row.db".to_string(),
            matchmaking_timeout_secs: 10,
            sweep_interval_secs: 30,
            bot_move_delay_ms: 1000,
            opponent_notify_delay_ms: 100,
            heartbeat_interval_secs: 30,
            analytics_enabled: false,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys keep defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!(port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or invalid values.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PORT`, `HOST`, `DATABASE_URL` and `MATCHMAKING_TIMEOUT`
    /// from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    #[instrument(skip(self))]
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    pub fn apply_vars(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(port) = var("PORT") {
            // Accept ":8080" as well as "8080".
            self.port = port
                .trim_start_matches(':')
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid PORT '{}': {}", port, e)))?;
        }
        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(timeout) = var("MATCHMAKING_TIMEOUT") {
            self.matchmaking_timeout_secs = timeout.parse().map_err(|e| {
                ConfigError::new(format!("Invalid MATCHMAKING_TIMEOUT '{}': {}", timeout, e))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Overrides the bind address.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Overrides the database path.
    pub fn with_database_url(mut self, database_url: String) -> Self {
        self.database_url = database_url;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.matchmaking_timeout_secs == 0 {
            return Err(ConfigError::new(
                "matchmaking_timeout_secs must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 || self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::new(
                "sweep and heartbeat intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Matchmaking timeout.
    pub fn matchmaking_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking_timeout_secs)
    }

    /// Wait-set sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Bot thinking delay.
    pub fn bot_move_delay(&self) -> Duration {
        Duration::from_millis(self.bot_move_delay_ms)
    }

    /// Delay before notifying the opponent of a new session.
    pub fn opponent_notify_delay(&self) -> Duration {
        Duration::from_millis(self.opponent_notify_delay_ms)
    }

    /// Keep-alive interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port(), &8080);
        assert_eq!(config.matchmaking_timeout(), Duration::from_secs(10));
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("port = 9000\nbot_move_delay_ms = 250\n").unwrap();
        assert_eq!(config.port(), &9000);
        assert_eq!(config.bot_move_delay(), Duration::from_millis(250));
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(ServerConfig::from_toml("matchmaking_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("PORT", ":3001"), ("MATCHMAKING_TIMEOUT", "5"), ("HOST", "")]
            .into_iter()
            .collect();
        let config = ServerConfig::default()
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port(), &3001);
        assert_eq!(config.matchmaking_timeout_secs(), &5);
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_bad_port_is_an_error() {
        let result = ServerConfig::default().apply_vars(|key| {
            (key == "PORT").then(|| "eighty".to_string())
        });
        let err = result.unwrap_err();
        assert!(err.message.contains("Invalid PORT"));
    }
}
