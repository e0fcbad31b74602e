//! Role contexts: per-role callback slots plus the owner task identity.
//!
//! A context's owner task and runtime are fixed at construction. Only the
//! callback slots change afterwards, each independently.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::Role;
use crate::runtime::ScriptRuntime;
use crate::tasks::TaskControl;
use crate::types::{Error, Result, TaskId};

/// Every named callback slot across both roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    OnConnected,
    OnDisconnected,
    OnStationJoined,
    OnStationLeft,
    OnStationGotAddress,
}

impl CallbackSlot {
    pub fn role(self) -> Role {
        match self {
            CallbackSlot::OnConnected | CallbackSlot::OnDisconnected => Role::Station,
            CallbackSlot::OnStationJoined
            | CallbackSlot::OnStationLeft
            | CallbackSlot::OnStationGotAddress => Role::AccessPoint,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CallbackSlot::OnConnected => "on_connected",
            CallbackSlot::OnDisconnected => "on_disconnected",
            CallbackSlot::OnStationJoined => "on_station_joined",
            CallbackSlot::OnStationLeft => "on_station_left",
            CallbackSlot::OnStationGotAddress => "on_station_got_address",
        }
    }
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CallbackSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on_connected" => Ok(CallbackSlot::OnConnected),
            "on_disconnected" => Ok(CallbackSlot::OnDisconnected),
            "on_station_joined" | "on_station_connected" => Ok(CallbackSlot::OnStationJoined),
            "on_station_left" | "on_station_disconnected" => Ok(CallbackSlot::OnStationLeft),
            "on_station_got_address" | "on_station_got_ip" => {
                Ok(CallbackSlot::OnStationGotAddress)
            }
            other => Err(Error::validation(format!("unknown callback slot: {other}"))),
        }
    }
}

/// One optional closure.
pub struct Slot<C> {
    slot: CallbackSlot,
    closure: Mutex<Option<C>>,
}

impl<C: Clone> Slot<C> {
    fn new(slot: CallbackSlot) -> Self {
        Self {
            slot,
            closure: Mutex::new(None),
        }
    }

    pub fn id(&self) -> CallbackSlot {
        self.slot
    }

    /// Replace the closure; `None` clears it. Returns the previous value.
    pub fn set(&self, closure: Option<C>) -> Option<C> {
        let mut current = self.closure.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, closure)
    }

    /// Clone of the current closure. The lock is released before return so
    /// a running callback may re-register slots.
    pub fn get(&self) -> Option<C> {
        self.closure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.closure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<C: Clone> fmt::Debug for Slot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("slot", &self.slot)
            .field("set", &self.is_set())
            .finish()
    }
}

/// State shared by both context kinds.
pub struct ContextCore<R: ScriptRuntime> {
    owner_task: TaskId,
    runtime: Arc<R>,
    tasks: Arc<dyn TaskControl>,
    retired: AtomicBool,
}

impl<R: ScriptRuntime> ContextCore<R> {
    pub(crate) fn new(runtime: Arc<R>, tasks: Arc<dyn TaskControl>) -> Self {
        Self {
            owner_task: tasks.current_task(),
            runtime,
            tasks,
            retired: AtomicBool::new(false),
        }
    }

    pub fn owner_task(&self) -> TaskId {
        self.owner_task
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn tasks(&self) -> &Arc<dyn TaskControl> {
        &self.tasks
    }

    /// Set once the owning role object has been destroyed.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl<R: ScriptRuntime> fmt::Debug for ContextCore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCore")
            .field("owner_task", &self.owner_task)
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}

/// Station role: `on_connected(address)`, `on_disconnected()`.
pub struct StationContext<R: ScriptRuntime> {
    core: ContextCore<R>,
    on_connected: Slot<R::Closure>,
    on_disconnected: Slot<R::Closure>,
}

impl<R: ScriptRuntime> StationContext<R> {
    pub(crate) fn new(core: ContextCore<R>) -> Self {
        Self {
            core,
            on_connected: Slot::new(CallbackSlot::OnConnected),
            on_disconnected: Slot::new(CallbackSlot::OnDisconnected),
        }
    }

    pub fn core(&self) -> &ContextCore<R> {
        &self.core
    }

    pub fn on_connected(&self) -> &Slot<R::Closure> {
        &self.on_connected
    }

    pub fn on_disconnected(&self) -> &Slot<R::Closure> {
        &self.on_disconnected
    }
}

/// Access-point role: `on_station_joined(mac)`, `on_station_left(mac)`,
/// `on_station_got_address(address)`.
pub struct AccessPointContext<R: ScriptRuntime> {
    core: ContextCore<R>,
    on_station_joined: Slot<R::Closure>,
    on_station_left: Slot<R::Closure>,
    on_station_got_address: Slot<R::Closure>,
}

impl<R: ScriptRuntime> AccessPointContext<R> {
    pub(crate) fn new(core: ContextCore<R>) -> Self {
        Self {
            core,
            on_station_joined: Slot::new(CallbackSlot::OnStationJoined),
            on_station_left: Slot::new(CallbackSlot::OnStationLeft),
            on_station_got_address: Slot::new(CallbackSlot::OnStationGotAddress),
        }
    }

    pub fn core(&self) -> &ContextCore<R> {
        &self.core
    }

    pub fn on_station_joined(&self) -> &Slot<R::Closure> {
        &self.on_station_joined
    }

    pub fn on_station_left(&self) -> &Slot<R::Closure> {
        &self.on_station_left
    }

    pub fn on_station_got_address(&self) -> &Slot<R::Closure> {
        &self.on_station_got_address
    }
}

impl<R: ScriptRuntime> fmt::Debug for StationContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationContext")
            .field("core", &self.core)
            .field("on_connected", &self.on_connected)
            .field("on_disconnected", &self.on_disconnected)
            .finish()
    }
}

impl<R: ScriptRuntime> fmt::Debug for AccessPointContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointContext")
            .field("core", &self.core)
            .field("on_station_joined", &self.on_station_joined)
            .field("on_station_left", &self.on_station_left)
            .field("on_station_got_address", &self.on_station_got_address)
            .finish()
    }
}

/// Either context kind, as held by the dispatch registry.
pub enum RoleContext<R: ScriptRuntime> {
    Station(Arc<StationContext<R>>),
    AccessPoint(Arc<AccessPointContext<R>>),
}

impl<R: ScriptRuntime> RoleContext<R> {
    pub fn role(&self) -> Role {
        match self {
            RoleContext::Station(_) => Role::Station,
            RoleContext::AccessPoint(_) => Role::AccessPoint,
        }
    }

    pub fn core(&self) -> &ContextCore<R> {
        match self {
            RoleContext::Station(ctx) => ctx.core(),
            RoleContext::AccessPoint(ctx) => ctx.core(),
        }
    }

    /// The slot named `slot`, if this context's role has it.
    pub fn slot(&self, slot: CallbackSlot) -> Option<&Slot<R::Closure>> {
        match (self, slot) {
            (RoleContext::Station(ctx), CallbackSlot::OnConnected) => Some(ctx.on_connected()),
            (RoleContext::Station(ctx), CallbackSlot::OnDisconnected) => {
                Some(ctx.on_disconnected())
            }
            (RoleContext::AccessPoint(ctx), CallbackSlot::OnStationJoined) => {
                Some(ctx.on_station_joined())
            }
            (RoleContext::AccessPoint(ctx), CallbackSlot::OnStationLeft) => {
                Some(ctx.on_station_left())
            }
            (RoleContext::AccessPoint(ctx), CallbackSlot::OnStationGotAddress) => {
                Some(ctx.on_station_got_address())
            }
            _ => None,
        }
    }

    /// Overwrite one slot. Fails only if the slot belongs to the other role.
    pub fn set_callback(&self, slot: CallbackSlot, closure: Option<R::Closure>) -> Result<()> {
        let target = self.slot(slot).ok_or_else(|| {
            Error::validation(format!("{} has no {} slot", self.role(), slot))
        })?;
        target.set(closure);
        tracing::debug!(role = %self.role(), slot = %slot, "callback_slot_updated");
        Ok(())
    }

    /// Whether both handles point at the same context.
    pub fn same_as(&self, other: &RoleContext<R>) -> bool {
        match (self, other) {
            (RoleContext::Station(a), RoleContext::Station(b)) => Arc::ptr_eq(a, b),
            (RoleContext::AccessPoint(a), RoleContext::AccessPoint(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<R: ScriptRuntime> Clone for RoleContext<R> {
    fn clone(&self) -> Self {
        match self {
            RoleContext::Station(ctx) => RoleContext::Station(ctx.clone()),
            RoleContext::AccessPoint(ctx) => RoleContext::AccessPoint(ctx.clone()),
        }
    }
}

impl<R: ScriptRuntime> fmt::Debug for RoleContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleContext::Station(ctx) => f.debug_tuple("Station").field(ctx).finish(),
            RoleContext::AccessPoint(ctx) => f.debug_tuple("AccessPoint").field(ctx).finish(),
        }
    }
}
