//! Single-slot registry of the context events are routed to.
//!
//! Only the lifecycle manager mutates it (`register`, `unregister_if`); the
//! dispatcher only reads. Registering replaces whatever was there before.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use super::context::RoleContext;
use crate::runtime::ScriptRuntime;

pub struct DispatchRegistry<R: ScriptRuntime> {
    current: RwLock<Option<RoleContext<R>>>,
}

impl<R: ScriptRuntime> DispatchRegistry<R> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Route events to `context`. Returns the context it displaced.
    pub fn register(&self, context: RoleContext<R>) -> Option<RoleContext<R>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = current.replace(context);
        if let Some(prev) = &previous {
            tracing::info!(role = %prev.role(), "context_displaced");
        }
        previous
    }

    /// Clear the slot, but only if it still holds `context`.
    ///
    /// Returns whether the slot was cleared. Once this returns `true`, no
    /// later `current()` call can observe `context`.
    pub fn unregister_if(&self, context: &RoleContext<R>) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(registered) if registered.same_as(context) => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<RoleContext<R>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_registered(&self, context: &RoleContext<R>) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|registered| registered.same_as(context))
    }
}

impl<R: ScriptRuntime> Default for DispatchRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ScriptRuntime> fmt::Debug for DispatchRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|ctx| ctx.role());
        f.debug_struct("DispatchRegistry")
            .field("registered", &role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::context::{AccessPointContext, ContextCore, StationContext};
    use crate::events::Role;
    use crate::runtime::NativeRuntime;
    use crate::tasks::CooperativeScheduler;
    use std::sync::Arc;

    fn core() -> ContextCore<NativeRuntime> {
        ContextCore::new(
            Arc::new(NativeRuntime::new()),
            Arc::new(CooperativeScheduler::new()),
        )
    }

    fn station() -> RoleContext<NativeRuntime> {
        RoleContext::Station(Arc::new(StationContext::new(core())))
    }

    fn access_point() -> RoleContext<NativeRuntime> {
        RoleContext::AccessPoint(Arc::new(AccessPointContext::new(core())))
    }

    #[test]
    fn test_register_replaces_previous() {
        let registry = DispatchRegistry::new();
        let a = station();
        let b = access_point();

        assert!(registry.register(a.clone()).is_none());
        let displaced = registry.register(b.clone()).unwrap();
        assert!(displaced.same_as(&a));
        assert!(registry.is_registered(&b));
        assert!(!registry.is_registered(&a));
        assert_eq!(registry.current().unwrap().role(), Role::AccessPoint);
    }

    #[test]
    fn test_unregister_only_matching_context() {
        let registry = DispatchRegistry::new();
        let a = station();
        let b = station();
        registry.register(a.clone());
        registry.register(b.clone());

        // Stale context must not tear down the live registration.
        assert!(!registry.unregister_if(&a));
        assert!(registry.is_registered(&b));

        assert!(registry.unregister_if(&b));
        assert!(registry.current().is_none());
        assert!(!registry.unregister_if(&b));
    }
}
