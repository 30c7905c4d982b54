//! Configuration loaded from the environment.

use crate::error::{ConfigurationError, Result};
use dashmap::DashMap;
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display as StrumDisplay, EnumString};

/// Configuration service
///
/// A snapshot of key/value settings, shared cheaply between clones.
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment
    pub fn from_env() -> Self {
        Self::from_pairs(env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.config.insert(key.into(), value.into());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    /// Parse `key` if present
    ///
    /// # Errors
    /// [`ConfigurationError::InvalidValue`] when the value does not parse.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigurationError::invalid_value(key, format!("'{}': {}", raw, e)).into()
            }),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.config.contains_key(key)
    }
}

/// Controls how much detail error responses expose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Settings the host reads at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Larger request bodies are answered with 413
    pub max_body_bytes: usize,
    /// Upper bound for Stopped callbacks; `None` waits indefinitely
    pub stopped_timeout: Option<Duration>,
}

impl HostConfig {
    pub const HOST: &'static str = "HOSTKIT_HOST";
    pub const PORT: &'static str = "HOSTKIT_PORT";
    pub const ENVIRONMENT: &'static str = "HOSTKIT_ENVIRONMENT";
    pub const MAX_BODY_BYTES: &'static str = "HOSTKIT_MAX_BODY_BYTES";
    pub const STOPPED_TIMEOUT_SECS: &'static str = "HOSTKIT_STOPPED_TIMEOUT_SECS";

    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::from_env())
    }

    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: config.get(Self::HOST).unwrap_or(defaults.host),
            port: config.get_or(Self::PORT, defaults.port)?,
            environment: config.get_or(Self::ENVIRONMENT, defaults.environment)?,
            max_body_bytes: config.get_or(Self::MAX_BODY_BYTES, defaults.max_body_bytes)?,
            stopped_timeout: config
                .get_parsed::<u64>(Self::STOPPED_TIMEOUT_SECS)?
                .map(Duration::from_secs),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// The socket address to bind
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            ConfigurationError::invalid_value(Self::HOST, format!("'{}': {}", self.host, e)).into()
        })
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: Self::DEFAULT_PORT,
            environment: Environment::Production,
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
            stopped_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    #[test]
    fn defaults_apply_when_unset() {
        let config = HostConfig::from_config(&ConfigService::new()).unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn values_are_read_and_parsed() {
        let service = ConfigService::from_pairs([
            ("HOSTKIT_HOST", "127.0.0.1"),
            ("HOSTKIT_PORT", "8080"),
            ("HOSTKIT_ENVIRONMENT", "development"),
            ("HOSTKIT_MAX_BODY_BYTES", "1024"),
            ("HOSTKIT_STOPPED_TIMEOUT_SECS", "5"),
        ]);

        let config = HostConfig::from_config(&service).unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.stopped_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let service = ConfigService::from_pairs([("HOSTKIT_PORT", "eighty")]);
        let err = HostConfig::from_config(&service).unwrap_err();
        match err {
            HostError::Configuration(ConfigurationError::InvalidValue { key, .. }) => {
                assert_eq!(key, "HOSTKIT_PORT");
            }
            other => panic!("unexpected error: {other}"),
        }

        let service = ConfigService::from_pairs([("HOSTKIT_ENVIRONMENT", "staging")]);
        assert!(HostConfig::from_config(&service).is_err());
    }

    #[test]
    fn environment_round_trips_through_strings() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(Environment::Development.to_string(), "Development");
        assert!(!Environment::default().is_development());
    }

    #[test]
    fn set_overrides_loaded_values() {
        let service = ConfigService::from_pairs([("A", "1")]);
        service.set("A", "2");
        assert_eq!(service.get_parsed::<u32>("A").unwrap(), Some(2));
        assert!(service.contains("A"));
        assert_eq!(service.get("B"), None);
    }
}
