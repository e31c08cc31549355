use crate::backoff::ReconnectPolicy;
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where to connect and how to recover from a lost connection.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let server_url = std::env::var("COLLOQUY_SERVER_URL")
            .unwrap_or_else(|_| "ws://localhost:5000/ws".to_string());
        if !(server_url.starts_with("ws://") || server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "COLLOQUY_SERVER_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", server_url),
            ));
        }

        let defaults = ReconnectPolicy::default();
        let initial_delay = parse_var::<u64>("RECONNECT_INITIAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_delay);
        let max_delay = parse_var::<u64>("RECONNECT_MAX_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay);
        let multiplier = parse_var::<u32>("RECONNECT_MULTIPLIER")?.unwrap_or(defaults.multiplier);
        let max_attempts = parse_var::<u32>("RECONNECT_MAX_ATTEMPTS")?;

        if initial_delay.is_zero() {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_INITIAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if max_delay < initial_delay {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_MS".to_string(),
                "must not be smaller than RECONNECT_INITIAL_MS".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            reconnect: ReconnectPolicy {
                initial_delay,
                max_delay,
                multiplier,
                max_attempts,
            },
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("COLLOQUY_SERVER_URL");
            env::remove_var("RECONNECT_INITIAL_MS");
            env::remove_var("RECONNECT_MAX_MS");
            env::remove_var("RECONNECT_MULTIPLIER");
            env::remove_var("RECONNECT_MAX_ATTEMPTS");
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = ClientConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.server_url, "ws://localhost:5000/ws");
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("COLLOQUY_SERVER_URL", "wss://chat.example.com/ws");
            env::set_var("RECONNECT_INITIAL_MS", "250");
            env::set_var("RECONNECT_MAX_MS", "4000");
            env::set_var("RECONNECT_MULTIPLIER", "3");
            env::set_var("RECONNECT_MAX_ATTEMPTS", "7");
        }

        let config = ClientConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.server_url, "wss://chat.example.com/ws");
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(4));
        assert_eq!(config.reconnect.multiplier, 3);
        assert_eq!(config.reconnect.max_attempts, Some(7));
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_rejects_http_url() {
        clear_env_vars();
        unsafe {
            env::set_var("COLLOQUY_SERVER_URL", "http://localhost:5000");
        }

        let ConfigError::InvalidValue(var, _) = ClientConfig::from_env().unwrap_err();
        assert_eq!(var, "COLLOQUY_SERVER_URL");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_rejects_bad_number() {
        clear_env_vars();
        unsafe {
            env::set_var("RECONNECT_MULTIPLIER", "twice");
        }

        let ConfigError::InvalidValue(var, _) = ClientConfig::from_env().unwrap_err();
        assert_eq!(var, "RECONNECT_MULTIPLIER");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_rejects_inverted_delays() {
        clear_env_vars();
        unsafe {
            env::set_var("RECONNECT_INITIAL_MS", "5000");
            env::set_var("RECONNECT_MAX_MS", "100");
        }

        let ConfigError::InvalidValue(var, _) = ClientConfig::from_env().unwrap_err();
        assert_eq!(var, "RECONNECT_MAX_MS");
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_initial_delay() {
        clear_env_vars();
        unsafe {
            env::set_var("RECONNECT_INITIAL_MS", "0");
        }

        let ConfigError::InvalidValue(var, reason) = ClientConfig::from_env().unwrap_err();
        assert_eq!(var, "RECONNECT_INITIAL_MS");
        assert!(reason.contains("greater than zero"));
        clear_env_vars();
    }
}
