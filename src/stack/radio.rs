//! Radio configuration handed to the network stack.

use serde::{Deserialize, Serialize};

use crate::types::{Error, Result};

/// Longest SSID the radio accepts, in bytes.
pub const MAX_SSID_LEN: usize = 32;
/// Longest passphrase the radio accepts, in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;
/// Highest 2.4GHz channel.
pub const MAX_CHANNEL: u8 = 13;
/// Hardware limit on simultaneously associated peers.
pub const MAX_AP_CONNECTIONS: u8 = 10;

/// Radio operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WifiMode {
    Station,
    AccessPoint,
}

/// Access-point authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
}

impl AuthMode {
    /// Map the integer codes scripts pass in. Unknown codes mean open.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => AuthMode::Wep,
            2 => AuthMode::WpaPsk,
            3 => AuthMode::Wpa2Psk,
            4 => AuthMode::WpaWpa2Psk,
            5 => AuthMode::Wpa2Enterprise,
            _ => AuthMode::Open,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            AuthMode::Open => 0,
            AuthMode::Wep => 1,
            AuthMode::WpaPsk => 2,
            AuthMode::Wpa2Psk => 3,
            AuthMode::WpaWpa2Psk => 4,
            AuthMode::Wpa2Enterprise => 5,
        }
    }
}

/// Credentials for joining a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl StationConfig {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_ssid(&self.ssid)?;
        check_password(&self.password)
    }
}

/// Settings for hosting a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default = "default_max_connections")]
    pub max_connections: u8,
    /// 0 leaves the stack's default channel in place.
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub hidden: bool,
}

fn default_max_connections() -> u8 {
    4
}

impl AccessPointConfig {
    pub fn new(ssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: String::new(),
            auth_mode: AuthMode::Open,
            max_connections: default_max_connections(),
            channel: 0,
            hidden: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_ssid(&self.ssid)?;
        check_password(&self.password)?;
        if self.max_connections == 0 || self.max_connections > MAX_AP_CONNECTIONS {
            return Err(Error::validation(format!(
                "max_connections must be 1..={}, got {}",
                MAX_AP_CONNECTIONS, self.max_connections
            )));
        }
        if self.channel > MAX_CHANNEL {
            return Err(Error::validation(format!(
                "channel must be 0..={}, got {}",
                MAX_CHANNEL, self.channel
            )));
        }
        Ok(())
    }

    /// Channel to program into the radio, if any.
    pub fn effective_channel(&self) -> Option<u8> {
        (self.channel > 0).then_some(self.channel)
    }
}

/// Per-interface configuration written by `NetworkStack::set_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceConfig {
    Station(StationConfig),
    AccessPoint(AccessPointConfig),
}

impl InterfaceConfig {
    pub fn mode(&self) -> WifiMode {
        match self {
            InterfaceConfig::Station(_) => WifiMode::Station,
            InterfaceConfig::AccessPoint(_) => WifiMode::AccessPoint,
        }
    }
}

fn check_ssid(ssid: &str) -> Result<()> {
    if ssid.is_empty() {
        return Err(Error::validation("ssid cannot be empty"));
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(Error::validation(format!(
            "ssid is {} bytes, limit is {}",
            ssid.len(),
            MAX_SSID_LEN
        )));
    }
    Ok(())
}

fn check_password(password: &str) -> Result<()> {
    if password.len() > MAX_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "password is {} bytes, limit is {}",
            password.len(),
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}
