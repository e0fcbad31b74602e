//! Shared test doubles: a synchronous recording stack and a recording
//! task controller.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wifi_event_bridge::runtime::{NativeClosure, NativeRuntime};
use wifi_event_bridge::stack::{EventHandler, InterfaceConfig, NetworkStack, WifiMode};
use wifi_event_bridge::tasks::TaskControl;
use wifi_event_bridge::types::{Result, TaskId};
use wifi_event_bridge::{WifiBridge, WifiEvent};

pub const OWNER: TaskId = TaskId::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOp {
    Suspend(TaskId),
    Resume(TaskId),
}

/// Records every suspend/resume; never blocks.
#[derive(Debug, Default)]
pub struct RecordingTasks {
    ops: Mutex<Vec<TaskOp>>,
}

impl RecordingTasks {
    pub fn ops(&self) -> Vec<TaskOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }
}

impl TaskControl for RecordingTasks {
    fn current_task(&self) -> TaskId {
        OWNER
    }

    fn suspend(&self, task: TaskId) {
        self.ops.lock().unwrap().push(TaskOp::Suspend(task));
    }

    fn resume(&self, task: TaskId) {
        self.ops.lock().unwrap().push(TaskOp::Resume(task));
    }
}

/// Stack that delivers events synchronously on the caller's thread.
#[derive(Default)]
pub struct RecordingStack {
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
    pub connects: AtomicUsize,
    pub installs: AtomicUsize,
    pub removals: AtomicUsize,
}

impl RecordingStack {
    /// Hand `event` to the installed handler. Returns false if none.
    pub fn deliver(&self, event: WifiEvent) -> bool {
        let handler = self.handler.lock().unwrap().clone();
        match handler {
            Some(h) => {
                h.handle(&event);
                true
            }
            None => false,
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }
}

impl NetworkStack for RecordingStack {
    fn set_event_handler(&self, handler: Option<Arc<dyn EventHandler>>) -> Result<()> {
        if handler.is_some() {
            self.installs.fetch_add(1, Ordering::SeqCst);
        } else {
            self.removals.fetch_add(1, Ordering::SeqCst);
        }
        *self.handler.lock().unwrap() = handler;
        Ok(())
    }

    fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn set_mode(&self, _mode: WifiMode) -> Result<()> {
        Ok(())
    }

    fn set_config(&self, _config: &InterfaceConfig) -> Result<()> {
        Ok(())
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

pub struct Harness {
    pub stack: Arc<RecordingStack>,
    pub tasks: Arc<RecordingTasks>,
    pub runtime: Arc<NativeRuntime>,
    pub bridge: WifiBridge<NativeRuntime>,
}

pub fn harness() -> Harness {
    let stack = Arc::new(RecordingStack::default());
    let tasks = Arc::new(RecordingTasks::default());
    let runtime = Arc::new(NativeRuntime::new());
    let bridge = WifiBridge::new(stack.clone(), tasks.clone(), runtime.clone());
    Harness {
        stack,
        tasks,
        runtime,
        bridge,
    }
}

pub type Calls = Arc<Mutex<Vec<Vec<String>>>>;

/// Closure that records its arguments.
pub fn recorder(name: &str) -> (NativeClosure, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let closure = NativeClosure::new(name, {
        let calls = calls.clone();
        move |args| {
            calls.lock().unwrap().push(args.to_vec());
            Ok(())
        }
    });
    (closure, calls)
}

/// Closure that records an error message and fails.
pub fn failing(name: &str, message: &str) -> NativeClosure {
    let message = message.to_string();
    NativeClosure::new(name, move |_| Err(message.clone()))
}
