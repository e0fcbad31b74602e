//! Configuration structures.
//!
//! Configuration is loaded from JSON documents; every section falls back to
//! its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{Error, Result};
use crate::stack::{AccessPointConfig, StationConfig};

/// Global bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Readiness waits.
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Station credentials, if this device joins a network.
    #[serde(default)]
    pub station: Option<StationConfig>,

    /// Access-point settings, if this device hosts a network.
    #[serde(default)]
    pub access_point: Option<AccessPointConfig>,
}

impl Config {
    /// Parse a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check the radio sections before any of them reaches the stack.
    pub fn validate(&self) -> Result<()> {
        if let Some(station) = &self.station {
            station.validate()?;
        }
        if let Some(ap) = &self.access_point {
            ap.validate()?;
        }
        if self.readiness.connect_timeout.is_zero() {
            return Err(Error::validation("readiness.connect_timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Readiness wait configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessConfig {
    /// Default deadline for `Station::wait_connected`.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::AuthMode;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.readiness.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_humantime_timeout_and_radio_sections() {
        let config = Config::from_json_str(
            r#"{
                "readiness": { "connect_timeout": "5s" },
                "station": { "ssid": "home", "password": "hunter22" },
                "access_point": { "ssid": "esp32-ap", "password": "secret123", "auth_mode": "wpa2_psk", "max_connections": 2 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.readiness.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.station.unwrap().ssid, "home");
        let ap = config.access_point.unwrap();
        assert_eq!(ap.auth_mode, AuthMode::Wpa2Psk);
        assert_eq!(ap.max_connections, 2);
        assert_eq!(ap.channel, 0);
        assert!(!ap.hidden);
    }

    #[test]
    fn test_invalid_station_is_rejected() {
        let long_ssid = "x".repeat(33);
        let raw = format!(r#"{{ "station": {{ "ssid": "{long_ssid}", "password": "" }} }}"#);
        let err = Config::from_json_str(&raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = Config::from_json_str(r#"{ "readiness": { "connect_timeout": "0s" } }"#).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "observability": {{ "log_level": "debug", "json_logs": true }} }}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_json_file("/nonexistent/wifi-bridge.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
