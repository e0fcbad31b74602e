//! WiFi lifecycle events as delivered by the network stack.
//!
//! Every event carries the stack's numeric identifier (legacy ESP-IDF
//! `system_event_id_t` numbering) plus a kind-specific payload. Unknown
//! identifiers decode to [`WifiEvent::Other`] and are ignored downstream.

pub mod payload;

pub use payload::Payload;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::types::MacAddress;

/// Radio role an event (or a context) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Station,
    AccessPoint,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Station => f.write_str("station"),
            Role::AccessPoint => f.write_str("access_point"),
        }
    }
}

/// Raw event identifiers.
pub mod ids {
    pub const WIFI_READY: u32 = 0;
    pub const SCAN_DONE: u32 = 1;
    pub const STA_START: u32 = 2;
    pub const STA_STOP: u32 = 3;
    pub const STA_CONNECTED: u32 = 4;
    pub const STA_DISCONNECTED: u32 = 5;
    pub const STA_GOT_IP: u32 = 7;
    pub const STA_LOST_IP: u32 = 8;
    pub const AP_START: u32 = 13;
    pub const AP_STOP: u32 = 14;
    pub const AP_STACONNECTED: u32 = 15;
    pub const AP_STADISCONNECTED: u32 = 16;
    pub const AP_STAIPASSIGNED: u32 = 17;
    pub const AP_PROBEREQRECVED: u32 = 18;
}

/// Kind-specific data attached to a raw event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventInfo {
    #[default]
    None,
    Address(Ipv4Addr),
    Peer(MacAddress),
}

/// A decoded lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WifiEvent {
    WifiReady,
    ScanDone,
    /// Station radio started; the stack expects a connect request.
    StationStart,
    StationStop,
    StationConnected,
    /// Station link lost.
    StationDisconnected,
    /// Station obtained an address; the network is usable.
    StationGotIp { ip: Ipv4Addr },
    StationLostIp,
    ApStart,
    ApStop,
    /// A peer joined our access point.
    ApStationConnected { mac: MacAddress },
    /// A peer left our access point.
    ApStationDisconnected { mac: MacAddress },
    ApStationIpAssigned { ip: Ipv4Addr },
    ApProbeRequest,
    /// Anything the bridge has no name for.
    Other { id: u32 },
}

impl WifiEvent {
    /// Decode a raw record. A known id with a payload of the wrong shape
    /// decodes as `Other` so it falls through the dispatcher untouched.
    pub fn from_raw(id: u32, info: EventInfo) -> Self {
        match (id, info) {
            (ids::WIFI_READY, _) => WifiEvent::WifiReady,
            (ids::SCAN_DONE, _) => WifiEvent::ScanDone,
            (ids::STA_START, _) => WifiEvent::StationStart,
            (ids::STA_STOP, _) => WifiEvent::StationStop,
            (ids::STA_CONNECTED, _) => WifiEvent::StationConnected,
            (ids::STA_DISCONNECTED, _) => WifiEvent::StationDisconnected,
            (ids::STA_GOT_IP, EventInfo::Address(ip)) => WifiEvent::StationGotIp { ip },
            (ids::STA_LOST_IP, _) => WifiEvent::StationLostIp,
            (ids::AP_START, _) => WifiEvent::ApStart,
            (ids::AP_STOP, _) => WifiEvent::ApStop,
            (ids::AP_STACONNECTED, EventInfo::Peer(mac)) => WifiEvent::ApStationConnected { mac },
            (ids::AP_STADISCONNECTED, EventInfo::Peer(mac)) => {
                WifiEvent::ApStationDisconnected { mac }
            }
            (ids::AP_STAIPASSIGNED, EventInfo::Address(ip)) => {
                WifiEvent::ApStationIpAssigned { ip }
            }
            (ids::AP_PROBEREQRECVED, _) => WifiEvent::ApProbeRequest,
            (id, _) => WifiEvent::Other { id },
        }
    }

    /// Raw identifier of this event.
    pub fn id(&self) -> u32 {
        match self {
            WifiEvent::WifiReady => ids::WIFI_READY,
            WifiEvent::ScanDone => ids::SCAN_DONE,
            WifiEvent::StationStart => ids::STA_START,
            WifiEvent::StationStop => ids::STA_STOP,
            WifiEvent::StationConnected => ids::STA_CONNECTED,
            WifiEvent::StationDisconnected => ids::STA_DISCONNECTED,
            WifiEvent::StationGotIp { .. } => ids::STA_GOT_IP,
            WifiEvent::StationLostIp => ids::STA_LOST_IP,
            WifiEvent::ApStart => ids::AP_START,
            WifiEvent::ApStop => ids::AP_STOP,
            WifiEvent::ApStationConnected { .. } => ids::AP_STACONNECTED,
            WifiEvent::ApStationDisconnected { .. } => ids::AP_STADISCONNECTED,
            WifiEvent::ApStationIpAssigned { .. } => ids::AP_STAIPASSIGNED,
            WifiEvent::ApProbeRequest => ids::AP_PROBEREQRECVED,
            WifiEvent::Other { id } => *id,
        }
    }

    /// Stable snake_case name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            WifiEvent::WifiReady => "wifi_ready",
            WifiEvent::ScanDone => "scan_done",
            WifiEvent::StationStart => "sta_start",
            WifiEvent::StationStop => "sta_stop",
            WifiEvent::StationConnected => "sta_connected",
            WifiEvent::StationDisconnected => "sta_disconnected",
            WifiEvent::StationGotIp { .. } => "sta_got_ip",
            WifiEvent::StationLostIp => "sta_lost_ip",
            WifiEvent::ApStart => "ap_start",
            WifiEvent::ApStop => "ap_stop",
            WifiEvent::ApStationConnected { .. } => "ap_sta_connected",
            WifiEvent::ApStationDisconnected { .. } => "ap_sta_disconnected",
            WifiEvent::ApStationIpAssigned { .. } => "ap_sta_ip_assigned",
            WifiEvent::ApProbeRequest => "ap_probe_request",
            WifiEvent::Other { .. } => "other",
        }
    }

    /// Role whose context this event is routed to, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            WifiEvent::StationStart
            | WifiEvent::StationStop
            | WifiEvent::StationConnected
            | WifiEvent::StationDisconnected
            | WifiEvent::StationGotIp { .. }
            | WifiEvent::StationLostIp => Some(Role::Station),
            WifiEvent::ApStart
            | WifiEvent::ApStop
            | WifiEvent::ApStationConnected { .. }
            | WifiEvent::ApStationDisconnected { .. }
            | WifiEvent::ApStationIpAssigned { .. }
            | WifiEvent::ApProbeRequest => Some(Role::AccessPoint),
            WifiEvent::WifiReady | WifiEvent::ScanDone | WifiEvent::Other { .. } => None,
        }
    }
}

impl fmt::Display for WifiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}
