//! Event bridge - routes stack lifecycle events into script callbacks.
//!
//! ```text
//!   network stack ──► Dispatcher ──► invoke() ──► closure ──► user script
//!   (event loop)        │   ▲
//!                       │   └── DispatchRegistry (one RoleContext or none)
//!                       └────── ReadinessSignal (set / clear)
//! ```
//!
//! `WifiBridge` is the lifecycle manager: it creates a context for each role
//! object, registers it, and tears the registration down when the role
//! object is dropped.

pub mod context;
pub mod dispatcher;
pub mod invoker;
pub mod registry;
pub mod signal;

pub use context::{
    AccessPointContext, CallbackSlot, ContextCore, RoleContext, Slot, StationContext,
};
pub use dispatcher::{DispatchOutcome, DispatchStats, Dispatcher, Reaction, Route};
pub use invoker::{invoke, Invocation};
pub use registry::DispatchRegistry;
pub use signal::{ReadinessSignal, SignalSlot};

use std::fmt;
use std::sync::Arc;

use invoker::OwnerSection;

use crate::runtime::ScriptRuntime;
use crate::stack::{EventHandler, NetworkStack};
use crate::tasks::TaskControl;
use crate::types::{Config, Error, Result};

/// Context lifecycle manager. Cheap to clone; clones share all state.
pub struct WifiBridge<R: ScriptRuntime> {
    stack: Arc<dyn NetworkStack>,
    tasks: Arc<dyn TaskControl>,
    runtime: Arc<R>,
    registry: Arc<DispatchRegistry<R>>,
    signal: Arc<SignalSlot>,
    dispatcher: Arc<Dispatcher<R>>,
    config: Arc<Config>,
}

impl<R: ScriptRuntime> WifiBridge<R> {
    pub fn new(
        stack: Arc<dyn NetworkStack>,
        tasks: Arc<dyn TaskControl>,
        runtime: Arc<R>,
    ) -> Self {
        Self::with_config(stack, tasks, runtime, Config::default())
    }

    pub fn with_config(
        stack: Arc<dyn NetworkStack>,
        tasks: Arc<dyn TaskControl>,
        runtime: Arc<R>,
        config: Config,
    ) -> Self {
        let registry = Arc::new(DispatchRegistry::new());
        let signal = Arc::new(SignalSlot::new());
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            stack.clone(),
            signal.clone(),
        ));
        Self {
            stack,
            tasks,
            runtime,
            registry,
            signal,
            dispatcher,
            config: Arc::new(config),
        }
    }

    /// Create and register a station context owned by the calling task.
    pub fn create_station(&self) -> Result<Arc<StationContext<R>>> {
        let ctx = Arc::new(StationContext::new(self.new_core()));
        self.activate(RoleContext::Station(ctx.clone()))?;
        Ok(ctx)
    }

    /// Create and register an access-point context owned by the calling task.
    pub fn create_access_point(&self) -> Result<Arc<AccessPointContext<R>>> {
        let ctx = Arc::new(AccessPointContext::new(self.new_core()));
        self.activate(RoleContext::AccessPoint(ctx.clone()))?;
        Ok(ctx)
    }

    /// Tear down `context`: unregister it if it is still the routed one,
    /// then mark it retired so an event that already looked it up is dropped.
    ///
    /// Runs inside the owner's runtime section, so a callback in flight on
    /// the event loop completes before this returns.
    ///
    /// Returns whether `context` was the active registration. Destroying a
    /// context that a newer one displaced leaves the newer one untouched.
    pub fn destroy(&self, context: &RoleContext<R>) -> bool {
        let core = context.core();
        let _section = OwnerSection::enter(core.tasks().as_ref(), core.owner_task());

        let was_active = self.registry.unregister_if(context);
        if was_active {
            if let Err(e) = self.stack.set_event_handler(None) {
                tracing::warn!(role = %context.role(), error = %e, "event_handler_removal_failed");
            }
        }
        context.core().retire();
        tracing::info!(role = %context.role(), was_active, "context_destroyed");
        was_active
    }

    /// The readiness signal of the most recently created context.
    pub fn readiness(&self) -> Arc<ReadinessSignal> {
        self.signal.current()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<R>> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry<R>> {
        &self.registry
    }

    pub fn stack(&self) -> &Arc<dyn NetworkStack> {
        &self.stack
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn new_core(&self) -> ContextCore<R> {
        ContextCore::new(self.runtime.clone(), self.tasks.clone())
    }

    fn activate(&self, context: RoleContext<R>) -> Result<()> {
        self.signal.recreate();
        let displaced = self.registry.register(context.clone());

        let handler: Arc<dyn EventHandler> = self.dispatcher.clone();
        if let Err(e) = self.stack.set_event_handler(Some(handler)) {
            let core = context.core();
            let _section = OwnerSection::enter(core.tasks().as_ref(), core.owner_task());
            // The stack kept its previous handler; give it back its context.
            if self.registry.unregister_if(&context) {
                if let Some(previous) = displaced {
                    self.registry.register(previous);
                }
            }
            core.retire();
            tracing::error!(role = %context.role(), error = %e, "event_registration_failed");
            return Err(match e {
                Error::Registration(msg) => Error::Registration(msg),
                other => Error::registration(other.to_string()),
            });
        }

        tracing::info!(
            role = %context.role(),
            owner = %context.core().owner_task(),
            "context_registered"
        );
        Ok(())
    }
}

impl<R: ScriptRuntime> Clone for WifiBridge<R> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            tasks: self.tasks.clone(),
            runtime: self.runtime.clone(),
            registry: self.registry.clone(),
            signal: self.signal.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: ScriptRuntime> fmt::Debug for WifiBridge<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiBridge")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
