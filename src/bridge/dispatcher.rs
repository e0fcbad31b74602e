//! Event dispatcher: the one handler installed in the network stack.
//!
//! Per event, in order:
//!   1. mandatory stack reaction (connect request, readiness set/clear),
//!      regardless of any registered context
//!   2. route to the registered context if its role matches
//!   3. invoke the matching callback slot with the derived payload
//!
//! | event                 | reaction               | slot                |
//! |-----------------------|------------------------|---------------------|
//! | sta_start             | connect                | -                   |
//! | sta_got_ip            | set ready              | on_connected(ip)    |
//! | sta_disconnected      | connect, clear ready   | on_disconnected()   |
//! | ap_sta_connected      | connect, clear ready   | on_station_joined(mac) |
//! | ap_sta_disconnected   | connect, clear ready   | on_station_left(mac)   |
//!
//! Everything else is ignored. The access-point rows re-request a station
//! connection and clear readiness on every peer transition; scripts can
//! observe that, so it is kept as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::context::{CallbackSlot, RoleContext};
use super::invoker::{invoke, Invocation};
use super::registry::DispatchRegistry;
use super::signal::SignalSlot;
use crate::events::{Payload, WifiEvent};
use crate::runtime::ScriptRuntime;
use crate::stack::{EventHandler, NetworkStack};

/// How one event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Not in the dispatch table.
    Ignored,
    /// Reaction done; the event has no callback slot.
    ReactionOnly,
    /// No context registered.
    NoContext,
    /// The registered context belongs to the other role.
    RoleMismatch,
    /// The context was destroyed before invocation.
    Retired,
    SlotUnset,
    Called,
    /// The callback raised; the error went to the runtime.
    CallbackFailed,
}

/// Result of the mandatory reaction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Event is outside the dispatch table.
    Unlisted,
    /// Reaction applied; no callback for this event.
    Done,
    /// Reaction applied; continue to this slot.
    Callback(CallbackSlot),
}

/// A resolved callback target.
pub struct Route<R: ScriptRuntime> {
    pub context: RoleContext<R>,
    pub slot: CallbackSlot,
    pub payload: Payload,
}

impl<R: ScriptRuntime> fmt::Debug for Route<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("role", &self.context.role())
            .field("slot", &self.slot)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Statistics about dispatcher traffic.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub events_seen: u64,
    pub events_ignored: u64,
    pub events_dropped: u64,
    pub callbacks_invoked: u64,
    pub callback_errors: u64,
    pub reaction_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events_seen: AtomicU64,
    events_ignored: AtomicU64,
    events_dropped: AtomicU64,
    callbacks_invoked: AtomicU64,
    callback_errors: AtomicU64,
    reaction_failures: AtomicU64,
}

pub struct Dispatcher<R: ScriptRuntime> {
    registry: Arc<DispatchRegistry<R>>,
    /// Weak: the stack owns the installed dispatcher.
    stack: Weak<dyn NetworkStack>,
    signal: Arc<SignalSlot>,
    counters: Counters,
}

impl<R: ScriptRuntime> Dispatcher<R> {
    pub fn new(
        registry: Arc<DispatchRegistry<R>>,
        stack: Arc<dyn NetworkStack>,
        signal: Arc<SignalSlot>,
    ) -> Self {
        Self {
            registry,
            stack: Arc::downgrade(&stack),
            signal,
            counters: Counters::default(),
        }
    }

    /// Handle one event end to end.
    pub fn dispatch(&self, event: &WifiEvent) -> DispatchOutcome {
        self.counters.events_seen.fetch_add(1, Ordering::Relaxed);

        let slot = match self.react(event) {
            Reaction::Unlisted => {
                self.counters.events_ignored.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(event = %event, "event_ignored");
                return DispatchOutcome::Ignored;
            }
            Reaction::Done => return DispatchOutcome::ReactionOnly,
            Reaction::Callback(slot) => slot,
        };

        match self.resolve(event, slot) {
            Ok(route) => self.deliver(route),
            Err(outcome) => {
                self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = %event, outcome = ?outcome, "event_dropped");
                outcome
            }
        }
    }

    /// Apply the mandatory stack reaction for `event`.
    pub fn react(&self, event: &WifiEvent) -> Reaction {
        match event {
            WifiEvent::StationStart => {
                self.request_connect(event);
                Reaction::Done
            }
            WifiEvent::StationGotIp { .. } => {
                self.signal.current().set();
                Reaction::Callback(CallbackSlot::OnConnected)
            }
            WifiEvent::StationDisconnected => {
                // The driver does not re-associate on its own.
                self.request_connect(event);
                self.signal.current().clear();
                Reaction::Callback(CallbackSlot::OnDisconnected)
            }
            WifiEvent::ApStationConnected { .. } => {
                self.request_connect(event);
                self.signal.current().clear();
                Reaction::Callback(CallbackSlot::OnStationJoined)
            }
            WifiEvent::ApStationDisconnected { .. } => {
                self.request_connect(event);
                self.signal.current().clear();
                Reaction::Callback(CallbackSlot::OnStationLeft)
            }
            _ => Reaction::Unlisted,
        }
    }

    /// Look up the registered context for `slot`'s role.
    pub fn resolve(
        &self,
        event: &WifiEvent,
        slot: CallbackSlot,
    ) -> Result<Route<R>, DispatchOutcome> {
        let context = self.registry.current().ok_or(DispatchOutcome::NoContext)?;
        if context.role() != slot.role() {
            return Err(DispatchOutcome::RoleMismatch);
        }
        Ok(Route {
            context,
            slot,
            payload: Payload::for_event(event),
        })
    }

    /// Invoke a resolved route and report any user error to the runtime.
    pub fn deliver(&self, route: Route<R>) -> DispatchOutcome {
        let Some(slot) = route.context.slot(route.slot) else {
            return DispatchOutcome::RoleMismatch;
        };
        let core = route.context.core();

        match invoke(core, slot, route.payload) {
            Ok(Invocation::Called) => {
                self.counters.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Called
            }
            Ok(Invocation::SlotUnset) => DispatchOutcome::SlotUnset,
            Ok(Invocation::Retired) => {
                self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Retired
            }
            Err(err) => {
                self.counters.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
                self.counters.callback_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(slot = %route.slot, error = %err, "callback_failed");
                core.runtime().report_error(err);
                DispatchOutcome::CallbackFailed
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            events_seen: c.events_seen.load(Ordering::Relaxed),
            events_ignored: c.events_ignored.load(Ordering::Relaxed),
            events_dropped: c.events_dropped.load(Ordering::Relaxed),
            callbacks_invoked: c.callbacks_invoked.load(Ordering::Relaxed),
            callback_errors: c.callback_errors.load(Ordering::Relaxed),
            reaction_failures: c.reaction_failures.load(Ordering::Relaxed),
        }
    }

    fn request_connect(&self, event: &WifiEvent) {
        let Some(stack) = self.stack.upgrade() else {
            tracing::debug!(event = %event, "connect_request_without_stack");
            return;
        };
        if let Err(e) = stack.connect() {
            self.counters.reaction_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(event = %event, error = %e, "connect_request_failed");
        }
    }
}

impl<R: ScriptRuntime> EventHandler for Dispatcher<R> {
    fn handle(&self, event: &WifiEvent) {
        let outcome = self.dispatch(event);
        tracing::trace!(event = %event, outcome = ?outcome, "event_handled");
    }
}

impl<R: ScriptRuntime> fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::context::{AccessPointContext, ContextCore, StationContext};
    use crate::runtime::{NativeClosure, NativeRuntime};
    use crate::stack::MockNetworkStack;
    use crate::tasks::CooperativeScheduler;
    use crate::types::{Error, MacAddress};
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    struct Fixture {
        dispatcher: Dispatcher<NativeRuntime>,
        _stack: Arc<dyn NetworkStack>,
        registry: Arc<DispatchRegistry<NativeRuntime>>,
        signal: Arc<SignalSlot>,
        runtime: Arc<NativeRuntime>,
        tasks: Arc<CooperativeScheduler>,
    }

    fn fixture(stack: MockNetworkStack) -> Fixture {
        let registry = Arc::new(DispatchRegistry::new());
        let signal = Arc::new(SignalSlot::new());
        let stack: Arc<dyn NetworkStack> = Arc::new(stack);
        Fixture {
            dispatcher: Dispatcher::new(registry.clone(), stack.clone(), signal.clone()),
            _stack: stack,
            registry,
            signal,
            runtime: Arc::new(NativeRuntime::new()),
            tasks: Arc::new(CooperativeScheduler::new()),
        }
    }

    fn connects(times: usize) -> MockNetworkStack {
        let mut stack = MockNetworkStack::new();
        stack.expect_connect().times(times).returning(|| Ok(()));
        stack
    }

    impl Fixture {
        fn core(&self) -> ContextCore<NativeRuntime> {
            ContextCore::new(self.runtime.clone(), self.tasks.clone())
        }

        fn station(&self) -> Arc<StationContext<NativeRuntime>> {
            let ctx = Arc::new(StationContext::new(self.core()));
            self.registry.register(RoleContext::Station(ctx.clone()));
            ctx
        }

        fn access_point(&self) -> Arc<AccessPointContext<NativeRuntime>> {
            let ctx = Arc::new(AccessPointContext::new(self.core()));
            self.registry.register(RoleContext::AccessPoint(ctx.clone()));
            ctx
        }
    }

    fn recorder() -> (NativeClosure, Arc<Mutex<Vec<Vec<String>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let closure = NativeClosure::new("recorder", {
            let calls = calls.clone();
            move |args| {
                calls.lock().unwrap().push(args.to_vec());
                Ok(())
            }
        });
        (closure, calls)
    }

    #[test]
    fn test_station_start_requests_connection_only() {
        let f = fixture(connects(1));
        f.station();
        assert_eq!(f.dispatcher.dispatch(&WifiEvent::StationStart), DispatchOutcome::ReactionOnly);
    }

    #[test]
    fn test_got_ip_sets_signal_and_calls_on_connected() {
        let f = fixture(connects(0));
        let ctx = f.station();
        let (closure, calls) = recorder();
        ctx.on_connected().set(Some(closure));

        let outcome = f
            .dispatcher
            .dispatch(&WifiEvent::StationGotIp { ip: Ipv4Addr::new(10, 0, 0, 5) });

        assert_eq!(outcome, DispatchOutcome::Called);
        assert!(f.signal.current().is_set());
        assert_eq!(*calls.lock().unwrap(), vec![vec!["10.0.0.5".to_string()]]);
    }

    #[test]
    fn test_link_lost_reconnects_clears_and_calls_without_args() {
        let f = fixture(connects(1));
        let ctx = f.station();
        f.signal.current().set();
        let (closure, calls) = recorder();
        ctx.on_disconnected().set(Some(closure));

        let outcome = f.dispatcher.dispatch(&WifiEvent::StationDisconnected);

        assert_eq!(outcome, DispatchOutcome::Called);
        assert!(!f.signal.current().is_set());
        assert_eq!(*calls.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_peer_joined_and_left_route_to_their_own_slots() {
        let f = fixture(connects(2));
        let ctx = f.access_point();
        let (joined, joined_calls) = recorder();
        let (left, left_calls) = recorder();
        ctx.on_station_joined().set(Some(joined));
        ctx.on_station_left().set(Some(left));
        let mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33]);

        f.dispatcher.dispatch(&WifiEvent::ApStationConnected { mac });
        f.dispatcher.dispatch(&WifiEvent::ApStationDisconnected { mac });

        assert_eq!(*joined_calls.lock().unwrap(), vec![vec!["aa:bb:cc:11:22:33".to_string()]]);
        assert_eq!(*left_calls.lock().unwrap(), vec![vec!["aa:bb:cc:11:22:33".to_string()]]);
    }

    #[test]
    fn test_unset_slots_still_react_exactly_once() {
        let f = fixture(connects(4));
        f.station();
        f.signal.current().set();

        let mac = MacAddress::new([1, 2, 3, 4, 5, 6]);
        assert_eq!(f.dispatcher.dispatch(&WifiEvent::StationStart), DispatchOutcome::ReactionOnly);
        assert_eq!(
            f.dispatcher.dispatch(&WifiEvent::StationGotIp { ip: Ipv4Addr::LOCALHOST }),
            DispatchOutcome::SlotUnset
        );
        assert!(f.signal.current().is_set());
        assert_eq!(
            f.dispatcher.dispatch(&WifiEvent::StationDisconnected),
            DispatchOutcome::SlotUnset
        );
        assert!(!f.signal.current().is_set());

        f.access_point();
        assert_eq!(
            f.dispatcher.dispatch(&WifiEvent::ApStationConnected { mac }),
            DispatchOutcome::SlotUnset
        );
        assert_eq!(
            f.dispatcher.dispatch(&WifiEvent::ApStationDisconnected { mac }),
            DispatchOutcome::SlotUnset
        );
        assert_eq!(f.runtime.stats().calls, 0);
    }

    #[test]
    fn test_reaction_runs_without_context() {
        let f = fixture(connects(1));
        assert_eq!(
            f.dispatcher.dispatch(&WifiEvent::StationDisconnected),
            DispatchOutcome::NoContext
        );
        assert_eq!(f.dispatcher.stats().events_dropped, 1);
    }

    #[test]
    fn test_role_mismatch_is_dropped() {
        let f = fixture(connects(0));
        let ap = f.access_point();
        let (closure, calls) = recorder();
        ap.on_station_got_address().set(Some(closure));

        let outcome = f
            .dispatcher
            .dispatch(&WifiEvent::StationGotIp { ip: Ipv4Addr::LOCALHOST });

        assert_eq!(outcome, DispatchOutcome::RoleMismatch);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unlisted_events_are_ignored() {
        let f = fixture(connects(0));
        let ap = f.access_point();
        let (closure, calls) = recorder();
        ap.on_station_got_address().set(Some(closure));

        for event in [
            WifiEvent::ScanDone,
            WifiEvent::ApStart,
            WifiEvent::ApStationIpAssigned { ip: Ipv4Addr::new(192, 168, 4, 2) },
            WifiEvent::Other { id: 99 },
        ] {
            assert_eq!(f.dispatcher.dispatch(&event), DispatchOutcome::Ignored);
        }
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(f.dispatcher.stats().events_ignored, 4);
    }

    #[test]
    fn test_callback_error_goes_to_runtime() {
        let f = fixture(connects(1));
        let ctx = f.station();
        ctx.on_disconnected()
            .set(Some(NativeClosure::new("bad", |_| Err("NameError".to_string()))));

        let outcome = f.dispatcher.dispatch(&WifiEvent::StationDisconnected);

        assert_eq!(outcome, DispatchOutcome::CallbackFailed);
        assert_eq!(f.runtime.stats().reported_errors, vec!["NameError".to_string()]);
        assert_eq!(f.tasks.stats().suspends, f.tasks.stats().resumes);
        assert_eq!(f.dispatcher.stats().callback_errors, 1);
    }

    #[traced_test]
    #[test]
    fn test_failed_connect_request_is_logged_not_raised() {
        let mut stack = MockNetworkStack::new();
        stack
            .expect_connect()
            .times(1)
            .returning(|| Err(Error::stack("ESP_ERR_WIFI_MODE")));
        let f = fixture(stack);
        f.access_point();

        let outcome = f
            .dispatcher
            .dispatch(&WifiEvent::ApStationDisconnected { mac: MacAddress::default() });

        assert_eq!(outcome, DispatchOutcome::SlotUnset);
        assert_eq!(f.dispatcher.stats().reaction_failures, 1);
        assert!(logs_contain("connect_request_failed"));
    }

    #[test]
    fn test_resolve_then_retire_then_deliver_is_dropped() {
        let f = fixture(connects(0));
        let ctx = f.station();
        ctx.on_connected()
            .set(Some(NativeClosure::new("stale", |_| panic!("ran on retired context"))));
        let event = WifiEvent::StationGotIp { ip: Ipv4Addr::LOCALHOST };

        let route = f.dispatcher.resolve(&event, CallbackSlot::OnConnected).unwrap();
        f.registry.unregister_if(&RoleContext::Station(ctx.clone()));
        ctx.core().retire();

        assert_eq!(f.dispatcher.deliver(route), DispatchOutcome::Retired);
        assert_eq!(f.runtime.stats().arena_saves, 0);
    }

    #[test]
    fn test_reaction_skips_connect_once_stack_is_released() {
        let mut stack = MockNetworkStack::new();
        stack.expect_connect().times(0);
        let stack: Arc<dyn NetworkStack> = Arc::new(stack);
        let dispatcher: Dispatcher<NativeRuntime> = Dispatcher::new(
            Arc::new(DispatchRegistry::new()),
            stack.clone(),
            Arc::new(SignalSlot::new()),
        );
        drop(stack);

        assert_eq!(dispatcher.dispatch(&WifiEvent::StationStart), DispatchOutcome::ReactionOnly);
        assert_eq!(dispatcher.stats().reaction_failures, 0);
    }
}
