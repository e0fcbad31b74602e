//! Callback payloads.
//!
//! A payload is kept in its typed form until the invoker has opened an arena
//! scope, and only then rendered into a runtime string.

use std::net::Ipv4Addr;

use super::WifiEvent;
use crate::types::MacAddress;

/// The zero-or-one argument passed to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    None,
    /// Rendered as dotted decimal: `192.168.4.2`.
    Address(Ipv4Addr),
    /// Rendered as lowercase colon-separated hex: `aa:bb:cc:11:22:33`.
    Peer(MacAddress),
}

impl Payload {
    /// Payload the dispatcher derives for `event`.
    pub fn for_event(event: &WifiEvent) -> Self {
        match event {
            WifiEvent::StationGotIp { ip } | WifiEvent::ApStationIpAssigned { ip } => {
                Payload::Address(*ip)
            }
            WifiEvent::ApStationConnected { mac } | WifiEvent::ApStationDisconnected { mac } => {
                Payload::Peer(*mac)
            }
            _ => Payload::None,
        }
    }

    /// String argument for the callback, `None` for zero-argument calls.
    pub fn render(&self) -> Option<String> {
        match self {
            Payload::None => None,
            Payload::Address(ip) => Some(format_address(*ip)),
            Payload::Peer(mac) => Some(format_peer(*mac)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

pub fn format_address(ip: Ipv4Addr) -> String {
    ip.to_string()
}

pub fn format_peer(mac: MacAddress) -> String {
    mac.to_string()
}
