//! Stream Configuration Settings
//!
//! Configuration types for the sensor stream, loaded from environment variables.

use std::time::Duration;

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// gRPC server port.
    pub grpc_port: u16,
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_port: 7000,
            health_port: 8082,
        }
    }
}

/// Reading emitter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterSettings {
    /// Time between two readings on one subscription.
    pub interval: Duration,
    /// Base seed for reproducible values (`None` = thread-local randomness).
    pub random_seed: Option<u64>,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            random_seed: None,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Reading emitter settings.
    pub emitter: EmitterSettings,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// emission interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Same as [`StreamConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server = ServerSettings {
            grpc_port: parse_var(&lookup, "SENSOR_STREAM_GRPC_PORT")?
                .unwrap_or(defaults.server.grpc_port),
            health_port: parse_var(&lookup, "SENSOR_STREAM_HEALTH_PORT")?
                .unwrap_or(defaults.server.health_port),
        };

        let interval = parse_var::<u64, _>(&lookup, "SENSOR_STREAM_INTERVAL_MS")?
            .map_or(defaults.emitter.interval, Duration::from_millis);
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "SENSOR_STREAM_INTERVAL_MS".to_string(),
                value: "0".to_string(),
                reason: "interval must be greater than zero".to_string(),
            });
        }

        let emitter = EmitterSettings {
            interval,
            random_seed: parse_var(&lookup, "SENSOR_STREAM_RANDOM_SEED")?,
        };

        Ok(Self { server, emitter })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable has a value that cannot be used.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Parse an optional variable; empty values count as unset.
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<StreamConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.server.grpc_port, 7000);
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.emitter.interval, Duration::from_secs(1));
        assert_eq!(config.emitter.random_seed, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("SENSOR_STREAM_GRPC_PORT", "9000"),
            ("SENSOR_STREAM_HEALTH_PORT", "9001"),
            ("SENSOR_STREAM_INTERVAL_MS", "250"),
            ("SENSOR_STREAM_RANDOM_SEED", "42"),
        ])
        .unwrap();

        assert_eq!(config.server.grpc_port, 9000);
        assert_eq!(config.server.health_port, 9001);
        assert_eq!(config.emitter.interval, Duration::from_millis(250));
        assert_eq!(config.emitter.random_seed, Some(42));
    }

    #[test_case("SENSOR_STREAM_GRPC_PORT", "not-a-port" ; "non numeric port")]
    #[test_case("SENSOR_STREAM_HEALTH_PORT", "70000" ; "port out of range")]
    #[test_case("SENSOR_STREAM_INTERVAL_MS", "-5" ; "negative interval")]
    #[test_case("SENSOR_STREAM_INTERVAL_MS", "0" ; "zero interval")]
    #[test_case("SENSOR_STREAM_RANDOM_SEED", "abc" ; "non numeric seed")]
    fn invalid_values_rejected(key: &str, value: &str) {
        let err = config_from(&[(key, value)]).unwrap_err();
        let ConfigError::InvalidValue { key: bad_key, .. } = err;
        assert_eq!(bad_key, key);
    }

    #[test_case(" 500 ", Duration::from_millis(500) ; "surrounding whitespace")]
    #[test_case("", Duration::from_secs(1) ; "empty falls back to default")]
    fn interval_parsing(raw: &str, expected: Duration) {
        let config = config_from(&[("SENSOR_STREAM_INTERVAL_MS", raw)]).unwrap();
        assert_eq!(config.emitter.interval, expected);
    }

    #[test]
    fn error_message_names_variable() {
        let err = config_from(&[("SENSOR_STREAM_GRPC_PORT", "x")]).unwrap_err();
        assert!(err.to_string().contains("SENSOR_STREAM_GRPC_PORT"));
    }
}
