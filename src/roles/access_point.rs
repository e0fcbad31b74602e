//! Access-point role: host a network, hear about peers joining and leaving.

use std::fmt;
use std::sync::Arc;

use crate::bridge::{AccessPointContext, CallbackSlot, RoleContext, WifiBridge};
use crate::runtime::ScriptRuntime;
use crate::stack::{AccessPointConfig, InterfaceConfig, WifiMode};
use crate::types::{Error, Result};

pub struct AccessPoint<R: ScriptRuntime> {
    bridge: WifiBridge<R>,
    context: Arc<AccessPointContext<R>>,
    config: Option<AccessPointConfig>,
}

impl<R: ScriptRuntime> AccessPoint<R> {
    /// Create the access-point context and start routing events to it.
    pub fn new(bridge: &WifiBridge<R>) -> Result<Self> {
        let context = bridge.create_access_point()?;
        Ok(Self {
            bridge: bridge.clone(),
            context,
            config: None,
        })
    }

    /// Called with the peer's MAC, e.g. `"aa:bb:cc:11:22:33"`.
    pub fn on_station_joined(&self, closure: Option<R::Closure>) -> &Self {
        self.context.on_station_joined().set(closure);
        self
    }

    pub fn on_station_left(&self, closure: Option<R::Closure>) -> &Self {
        self.context.on_station_left().set(closure);
        self
    }

    pub fn on_station_got_address(&self, closure: Option<R::Closure>) -> &Self {
        self.context.on_station_got_address().set(closure);
        self
    }

    /// Set a slot by its script-side name.
    pub fn set_callback(&self, slot: &str, closure: Option<R::Closure>) -> Result<()> {
        let slot: CallbackSlot = slot.parse()?;
        RoleContext::AccessPoint(self.context.clone()).set_callback(slot, closure)
    }

    /// Bring the radio up in access-point mode.
    pub fn start(&mut self, config: AccessPointConfig) -> Result<()> {
        config.validate()?;
        let stack = self.bridge.stack();
        stack.init()?;
        stack.set_mode(WifiMode::AccessPoint)?;
        stack.set_config(&InterfaceConfig::AccessPoint(config.clone()))?;
        stack.start()?;
        tracing::info!(
            ssid = %config.ssid,
            auth_mode = ?config.auth_mode,
            max_connections = config.max_connections,
            channel = ?config.effective_channel(),
            hidden = config.hidden,
            "access_point_started"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Start with the `access_point` section of the bridge config.
    pub fn start_configured(&mut self) -> Result<()> {
        let config = self
            .bridge
            .config()
            .access_point
            .clone()
            .ok_or_else(|| Error::validation("no access_point section in config"))?;
        self.start(config)
    }

    pub fn stop(&self) -> Result<()> {
        self.bridge.stack().stop()?;
        tracing::info!("access_point_stopped");
        Ok(())
    }

    pub fn config(&self) -> Option<&AccessPointConfig> {
        self.config.as_ref()
    }

    pub fn context(&self) -> &Arc<AccessPointContext<R>> {
        &self.context
    }
}

impl<R: ScriptRuntime> Drop for AccessPoint<R> {
    fn drop(&mut self) {
        self.bridge
            .destroy(&RoleContext::AccessPoint(self.context.clone()));
    }
}

impl<R: ScriptRuntime> fmt::Debug for AccessPoint<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPoint")
            .field("context", &self.context)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
