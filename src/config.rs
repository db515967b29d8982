//! Command-line configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via APNS_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags (applied by the caller)

use apns_client::{ConnectionConfig, ProtocolScheme};
use apns_protocol::CommandFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Use the sandbox gateway and feedback hosts.
    pub sandbox: bool,
    /// Client identity and server verification.
    pub tls: TlsConfig,
    /// Connect behaviour.
    pub connection: ConnectionSettings,
    /// Notification sending.
    pub gateway: GatewayConfig,
}

impl Config {
    /// Loads configuration from `path` (or APNS_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("APNS_CONFIG") {
                Ok(path) => Self::from_file(path)?,
                Err(_) => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `var`. Unparsable values are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(sandbox) = var("APNS_SANDBOX") {
            self.sandbox = parse_flag(&sandbox);
        }
        self.tls.apply_overrides(&var);
        self.connection.apply_overrides(&var);
        self.gateway.apply_overrides(&var);
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tls.certificate.is_none() {
            return Err(ConfigError::Validation(
                "certificate path not set".to_string(),
            ));
        }
        if self.connection.connect_attempts == 0 {
            return Err(ConfigError::Validation(
                "connect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection settings for the push gateway.
    pub fn gateway_connection(&self) -> ConnectionConfig {
        self.connection_for(ConnectionConfig::gateway(self.sandbox))
    }

    /// Connection settings for the feedback service.
    pub fn feedback_connection(&self) -> ConnectionConfig {
        self.connection_for(ConnectionConfig::feedback(self.sandbox))
    }

    fn connection_for(&self, base: ConnectionConfig) -> ConnectionConfig {
        let mut config = base
            .with_scheme(self.tls.scheme)
            .with_insecure(self.tls.insecure)
            .with_connect_timeout(self.connection.connect_timeout())
            .with_attempt_delay(self.connection.attempt_delay())
            .with_connect_attempts(self.connection.connect_attempts);
        if let Some(ref path) = self.tls.certificate {
            config = config.with_certificate_file(path);
        }
        if let Some(ref passphrase) = self.tls.passphrase {
            config = config.with_passphrase(passphrase);
        }
        if let Some(ref path) = self.tls.ca_file {
            config = config.with_ca_file(path);
        }
        config
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM file with the client certificate and private key.
    pub certificate: Option<PathBuf>,
    /// Passphrase for an encrypted private key.
    pub passphrase: Option<String>,
    /// CA certificates to verify the gateway against.
    pub ca_file: Option<PathBuf>,
    /// Skip server certificate verification (INSECURE - development only).
    pub insecure: bool,
    #[serde(with = "display_fromstr")]
    pub scheme: ProtocolScheme,
}

impl TlsConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("APNS_CERT") {
            self.certificate = Some(PathBuf::from(path));
        }
        if let Some(passphrase) = var("APNS_PASSPHRASE") {
            self.passphrase = Some(passphrase);
        }
        if let Some(path) = var("APNS_CA_FILE") {
            self.ca_file = Some(PathBuf::from(path));
        }
    }
}

/// Connect retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Timeout for one connect attempt, in seconds.
    pub connect_timeout_secs: u64,
    pub connect_attempts: u32,
    /// Pause between failed attempts, in microseconds.
    pub attempt_delay_us: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3,
            connect_attempts: 3,
            attempt_delay_us: 0,
        }
    }
}

impl ConnectionSettings {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(timeout) = var("APNS_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }
        if let Some(attempts) = var("APNS_CONNECT_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.connect_attempts = n;
            }
        }
        if let Some(delay) = var("APNS_ATTEMPT_DELAY_US") {
            if let Ok(us) = delay.parse() {
                self.attempt_delay_us = us;
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn attempt_delay(&self) -> Duration {
        Duration::from_micros(self.attempt_delay_us)
    }
}

/// Notification sending settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(with = "display_fromstr")]
    pub command_format: CommandFormat,
    /// Wait before polling for an error response, in milliseconds.
    pub read_delay_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            command_format: CommandFormat::Frame,
            read_delay_ms: 500,
        }
    }
}

impl GatewayConfig {
    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) {
        if let Some(format) = var("APNS_COMMAND_FORMAT") {
            if let Ok(parsed) = format.parse() {
                self.command_format = parsed;
            }
        }
        if let Some(delay) = var("APNS_READ_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.read_delay_ms = ms;
            }
        }
    }

    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms)
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    Parse(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Serde adapter for types that round-trip through their string form.
mod display_fromstr {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
