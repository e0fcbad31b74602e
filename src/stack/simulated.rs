//! In-process network stack for hosts without a radio.
//!
//! Events are queued on an unbounded channel and delivered by one dedicated
//! event-loop thread, strictly in posting order, to whatever handler is
//! installed at delivery time. That thread is the only serialization point
//! between events; the bridge adds no lock of its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use super::{EventHandler, InterfaceConfig, NetworkStack, WifiMode};
use crate::events::WifiEvent;
use crate::types::{Error, Result};

type HandlerSlot = Arc<RwLock<Option<Arc<dyn EventHandler>>>>;

/// A queued event plus an optional completion notice.
struct Delivery {
    event: Option<WifiEvent>,
    done: Option<oneshot::Sender<()>>,
}

/// Counters for stack control operations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackStats {
    pub connect_requests: u64,
    pub disconnect_requests: u64,
    pub handler_installs: u64,
    pub handler_removals: u64,
    pub starts: u64,
    pub stops: u64,
    pub events_delivered: u64,
    pub events_unhandled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    connect_requests: AtomicU64,
    disconnect_requests: AtomicU64,
    handler_installs: AtomicU64,
    handler_removals: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    events_delivered: AtomicU64,
    events_unhandled: AtomicU64,
}

#[derive(Debug, Default)]
struct RadioState {
    initialized: bool,
    mode: Option<WifiMode>,
    config: Option<InterfaceConfig>,
    started: bool,
}

/// Hosted `NetworkStack` with its own event-loop thread.
pub struct SimulatedStack {
    handler: HandlerSlot,
    tx: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    radio: Mutex<RadioState>,
    counters: Arc<Counters>,
    auto_address: Option<Ipv4Addr>,
    fail_registration: bool,
}

impl fmt::Debug for SimulatedStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedStack")
            .field("radio", &self.radio)
            .field("counters", &self.counters)
            .field("auto_address", &self.auto_address)
            .finish_non_exhaustive()
    }
}

impl SimulatedStack {
    /// Create the stack and spawn its event-loop thread.
    pub fn new() -> Result<Self> {
        Self::build(None, false)
    }

    /// A stack that answers every station connect request with
    /// `StationConnected` followed by `StationGotIp { ip }`.
    pub fn with_auto_address(ip: Ipv4Addr) -> Result<Self> {
        Self::build(Some(ip), false)
    }

    /// A stack whose handler registration always fails.
    pub fn failing_registration() -> Result<Self> {
        Self::build(None, true)
    }

    fn build(auto_address: Option<Ipv4Addr>, fail_registration: bool) -> Result<Self> {
        let handler: HandlerSlot = Arc::new(RwLock::new(None));
        let counters = Arc::new(Counters::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("wifi-event-loop".to_string())
            .spawn({
                let handler = handler.clone();
                let counters = counters.clone();
                move || run_event_loop(rx, handler, counters)
            })?;

        Ok(Self {
            handler,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            radio: Mutex::new(RadioState::default()),
            counters,
            auto_address,
            fail_registration,
        })
    }

    /// Queue an event for delivery and return immediately.
    pub fn post(&self, event: WifiEvent) -> Result<()> {
        self.enqueue(Delivery {
            event: Some(event),
            done: None,
        })
    }

    /// Queue an event and block until the event loop has handled it.
    ///
    /// Must not be called from inside a handler.
    pub fn deliver(&self, event: WifiEvent) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.enqueue(Delivery {
            event: Some(event),
            done: Some(done),
        })?;
        wait.blocking_recv()
            .map_err(|_| Error::internal("event loop exited before delivery"))
    }

    /// Block until every event posted so far has been handled.
    pub fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.enqueue(Delivery {
            event: None,
            done: Some(done),
        })?;
        wait.blocking_recv()
            .map_err(|_| Error::internal("event loop exited before flush"))
    }

    /// Close the queue and join the event-loop thread. Pending events are
    /// still delivered first.
    pub fn shutdown(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("event_loop_panicked");
            }
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn mode(&self) -> Option<WifiMode> {
        self.radio().mode
    }

    pub fn is_started(&self) -> bool {
        self.radio().started
    }

    pub fn config(&self) -> Option<InterfaceConfig> {
        self.radio().config.clone()
    }

    pub fn stats(&self) -> StackStats {
        let c = &self.counters;
        StackStats {
            connect_requests: c.connect_requests.load(Ordering::Relaxed),
            disconnect_requests: c.disconnect_requests.load(Ordering::Relaxed),
            handler_installs: c.handler_installs.load(Ordering::Relaxed),
            handler_removals: c.handler_removals.load(Ordering::Relaxed),
            starts: c.starts.load(Ordering::Relaxed),
            stops: c.stops.load(Ordering::Relaxed),
            events_delivered: c.events_delivered.load(Ordering::Relaxed),
            events_unhandled: c.events_unhandled.load(Ordering::Relaxed),
        }
    }

    fn radio(&self) -> std::sync::MutexGuard<'_, RadioState> {
        self.radio.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, delivery: Delivery) -> Result<()> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = tx
            .as_ref()
            .ok_or_else(|| Error::stack("event loop has been shut down"))?;
        tx.send(delivery)
            .map_err(|_| Error::stack("event loop is not running"))
    }
}

impl Drop for SimulatedStack {
    fn drop(&mut self) {
        // Dropping the sender ends the loop; the thread is left to finish
        // on its own so a drop on the loop thread cannot self-join.
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

fn run_event_loop(
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    handler: HandlerSlot,
    counters: Arc<Counters>,
) {
    while let Some(delivery) = rx.blocking_recv() {
        if let Some(event) = delivery.event {
            // Clone out so the handler runs without the slot lock held; a
            // handler may itself (un)register.
            let current = handler
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match current {
                Some(h) => {
                    h.handle(&event);
                    counters.events_delivered.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    tracing::trace!(event = %event, "event_without_handler");
                    counters.events_unhandled.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if let Some(done) = delivery.done {
            let _ = done.send(());
        }
    }
    tracing::debug!("event_loop_stopped");
}

impl NetworkStack for SimulatedStack {
    fn set_event_handler(&self, handler: Option<Arc<dyn EventHandler>>) -> Result<()> {
        if self.fail_registration && handler.is_some() {
            return Err(Error::registration("simulated registration failure"));
        }
        let installing = handler.is_some();
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
        if installing {
            self.counters.handler_installs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.handler_removals.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn connect(&self) -> Result<()> {
        self.counters.connect_requests.fetch_add(1, Ordering::Relaxed);
        let (mode, started) = {
            let radio = self.radio();
            (radio.mode, radio.started)
        };
        if mode != Some(WifiMode::Station) {
            return Err(Error::stack("connect requires station mode"));
        }
        if !started {
            return Err(Error::stack("connect requires a started radio"));
        }
        if let Some(ip) = self.auto_address {
            self.post(WifiEvent::StationConnected)?;
            self.post(WifiEvent::StationGotIp { ip })?;
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.counters
            .disconnect_requests
            .fetch_add(1, Ordering::Relaxed);
        if self.radio().mode != Some(WifiMode::Station) {
            return Err(Error::stack("disconnect requires station mode"));
        }
        self.post(WifiEvent::StationDisconnected)
    }

    fn init(&self) -> Result<()> {
        self.radio().initialized = true;
        Ok(())
    }

    fn set_mode(&self, mode: WifiMode) -> Result<()> {
        let mut radio = self.radio();
        if !radio.initialized {
            return Err(Error::stack("set_mode before init"));
        }
        radio.mode = Some(mode);
        Ok(())
    }

    fn set_config(&self, config: &InterfaceConfig) -> Result<()> {
        let mut radio = self.radio();
        if radio.mode != Some(config.mode()) {
            return Err(Error::stack(format!(
                "interface config for {:?} does not match mode {:?}",
                config.mode(),
                radio.mode
            )));
        }
        radio.config = Some(config.clone());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mode = {
            let mut radio = self.radio();
            let mode = radio.mode.ok_or_else(|| Error::stack("start before set_mode"))?;
            radio.started = true;
            mode
        };
        self.counters.starts.fetch_add(1, Ordering::Relaxed);
        match mode {
            WifiMode::Station => self.post(WifiEvent::StationStart),
            WifiMode::AccessPoint => self.post(WifiEvent::ApStart),
        }
    }

    fn stop(&self) -> Result<()> {
        let mode = {
            let mut radio = self.radio();
            if !radio.started {
                return Ok(());
            }
            radio.started = false;
            radio.mode
        };
        self.counters.stops.fetch_add(1, Ordering::Relaxed);
        match mode {
            Some(WifiMode::Station) => self.post(WifiEvent::StationStop),
            Some(WifiMode::AccessPoint) => self.post(WifiEvent::ApStop),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StationConfig;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<WifiEvent>>,
    }

    impl EventHandler for Recorder {
        fn handle(&self, event: &WifiEvent) {
            self.seen.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn test_events_delivered_in_order() {
        let stack = SimulatedStack::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        stack.set_event_handler(Some(recorder.clone())).unwrap();

        stack.post(WifiEvent::StationStart).unwrap();
        stack.post(WifiEvent::StationConnected).unwrap();
        stack.post(WifiEvent::StationDisconnected).unwrap();
        stack.flush().unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                WifiEvent::StationStart,
                WifiEvent::StationConnected,
                WifiEvent::StationDisconnected
            ]
        );
        assert_eq!(stack.stats().events_delivered, 3);
    }

    #[test]
    fn test_events_without_handler_are_counted() {
        let stack = SimulatedStack::new().unwrap();
        stack.deliver(WifiEvent::ScanDone).unwrap();
        assert_eq!(stack.stats().events_unhandled, 1);
    }

    #[test]
    fn test_station_bring_up_posts_start_and_auto_address() {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let stack = SimulatedStack::with_auto_address(ip).unwrap();
        let recorder = Arc::new(Recorder::default());
        stack.set_event_handler(Some(recorder.clone())).unwrap();

        stack.init().unwrap();
        stack.set_mode(WifiMode::Station).unwrap();
        stack
            .set_config(&InterfaceConfig::Station(StationConfig::new("home", "pw")))
            .unwrap();
        stack.start().unwrap();
        stack.connect().unwrap();
        stack.flush().unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                WifiEvent::StationStart,
                WifiEvent::StationConnected,
                WifiEvent::StationGotIp { ip }
            ]
        );
    }

    #[test]
    fn test_connect_outside_station_mode_fails_but_is_counted() {
        let stack = SimulatedStack::new().unwrap();
        stack.init().unwrap();
        stack.set_mode(WifiMode::AccessPoint).unwrap();
        assert!(stack.connect().is_err());
        assert_eq!(stack.stats().connect_requests, 1);
    }

    #[test]
    fn test_config_must_match_mode() {
        let stack = SimulatedStack::new().unwrap();
        stack.init().unwrap();
        stack.set_mode(WifiMode::AccessPoint).unwrap();
        let err = stack
            .set_config(&InterfaceConfig::Station(StationConfig::new("home", "")))
            .unwrap_err();
        assert!(matches!(err, Error::Stack(_)));
    }

    #[test]
    fn test_shutdown_rejects_new_events() {
        let stack = SimulatedStack::new().unwrap();
        stack.shutdown();
        assert!(stack.post(WifiEvent::ScanDone).is_err());
    }

    #[test]
    fn test_failing_registration() {
        let stack = SimulatedStack::failing_registration().unwrap();
        let err = stack
            .set_event_handler(Some(Arc::new(Recorder::default())))
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(stack.set_event_handler(None).is_ok());
    }
}
