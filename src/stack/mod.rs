//! Network stack collaborator interface.
//!
//! The stack owns the radio and delivers lifecycle events from its own
//! event-loop task. It accepts exactly one event handler at a time;
//! installing a new one replaces the previous registration.

mod radio;
pub mod simulated;

pub use radio::{
    AccessPointConfig, AuthMode, InterfaceConfig, StationConfig, WifiMode, MAX_AP_CONNECTIONS,
    MAX_CHANNEL, MAX_PASSWORD_LEN, MAX_SSID_LEN,
};
pub use simulated::{SimulatedStack, StackStats};

use std::sync::Arc;

use crate::events::WifiEvent;
use crate::types::Result;

/// Receiver of every lifecycle event the stack produces.
///
/// Called on the stack's event-loop task, one event at a time. Must not fail:
/// the stack only expects an acknowledgment.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &WifiEvent);
}

/// Operations the bridge needs from the network stack.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkStack: Send + Sync {
    /// Install `handler` as the single event receiver, or remove it with `None`.
    fn set_event_handler(&self, handler: Option<Arc<dyn EventHandler>>) -> Result<()>;

    /// Ask the station interface to (re)associate.
    fn connect(&self) -> Result<()>;

    /// Ask the station interface to drop its association.
    fn disconnect(&self) -> Result<()>;

    /// Initialize the WiFi driver with credentials kept in RAM only.
    fn init(&self) -> Result<()>;

    fn set_mode(&self, mode: WifiMode) -> Result<()>;

    fn set_config(&self, config: &InterfaceConfig) -> Result<()>;

    /// Start the radio in the configured mode.
    fn start(&self) -> Result<()>;

    /// Stop the radio.
    fn stop(&self) -> Result<()>;
}
