//! Station role: join a network, hear about link up/down.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{CallbackSlot, RoleContext, StationContext, WifiBridge};
use crate::runtime::ScriptRuntime;
use crate::stack::{InterfaceConfig, StationConfig, WifiMode};
use crate::types::{Error, Result};

pub struct Station<R: ScriptRuntime> {
    bridge: WifiBridge<R>,
    context: Arc<StationContext<R>>,
    config: Option<StationConfig>,
}

impl<R: ScriptRuntime> Station<R> {
    /// Create the station context and start routing station events to it.
    pub fn new(bridge: &WifiBridge<R>) -> Result<Self> {
        let context = bridge.create_station()?;
        Ok(Self {
            bridge: bridge.clone(),
            context,
            config: None,
        })
    }

    /// Called with the acquired address, e.g. `"10.0.0.5"`. `None` clears.
    pub fn on_connected(&self, closure: Option<R::Closure>) -> &Self {
        self.context.on_connected().set(closure);
        self
    }

    /// Called with no arguments when the link drops. `None` clears.
    pub fn on_disconnected(&self, closure: Option<R::Closure>) -> &Self {
        self.context.on_disconnected().set(closure);
        self
    }

    /// Set a slot by its script-side name.
    pub fn set_callback(&self, slot: &str, closure: Option<R::Closure>) -> Result<()> {
        let slot: CallbackSlot = slot.parse()?;
        RoleContext::Station(self.context.clone()).set_callback(slot, closure)
    }

    /// Bring the radio up in station mode and join `ssid`.
    pub fn connect(&mut self, ssid: &str, password: &str) -> Result<()> {
        self.connect_with(StationConfig::new(ssid, password))
    }

    pub fn connect_with(&mut self, config: StationConfig) -> Result<()> {
        config.validate()?;
        let stack = self.bridge.stack();
        stack.init()?;
        stack.set_mode(WifiMode::Station)?;
        stack.set_config(&InterfaceConfig::Station(config.clone()))?;
        stack.start()?;
        tracing::info!(ssid = %config.ssid, "station_started");
        self.config = Some(config);
        Ok(())
    }

    /// Bring the station configured in `Config::station` up.
    pub fn connect_configured(&mut self) -> Result<()> {
        let config = self
            .bridge
            .config()
            .station
            .clone()
            .ok_or_else(|| Error::validation("no station section in config"))?;
        self.connect_with(config)
    }

    /// Stop the radio.
    pub fn disconnect(&self) -> Result<()> {
        self.bridge.stack().stop()?;
        tracing::info!("station_stopped");
        Ok(())
    }

    pub fn ssid(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.ssid.as_str())
    }

    /// Whether the readiness signal is currently set.
    pub fn is_connected(&self) -> bool {
        self.bridge.readiness().is_set()
    }

    /// Wait for an address. `None` uses `readiness.connect_timeout`.
    pub async fn wait_connected(&self, timeout: Option<Duration>) -> Result<()> {
        let limit = timeout.unwrap_or(self.bridge.config().readiness.connect_timeout);
        let signal = self.bridge.readiness();
        signal.wait_timeout(limit).await
    }

    pub fn context(&self) -> &Arc<StationContext<R>> {
        &self.context
    }
}

impl<R: ScriptRuntime> Drop for Station<R> {
    fn drop(&mut self) {
        self.bridge
            .destroy(&RoleContext::Station(self.context.clone()));
    }
}

impl<R: ScriptRuntime> fmt::Debug for Station<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("context", &self.context)
            .field("ssid", &self.ssid())
            .finish_non_exhaustive()
    }
}
