//! Reference runtime whose closures are plain Rust functions.
//!
//! The arena is a stack of live string allocations; restoring an index
//! drops everything allocated after it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ArenaIndex, ScriptRuntime};

type Body = dyn Fn(&[String]) -> Result<(), String> + Send + Sync;

/// A closure stored in a callback slot.
#[derive(Clone)]
pub struct NativeClosure {
    name: Arc<str>,
    body: Arc<Body>,
}

impl NativeClosure {
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&[String]) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeClosure")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Snapshot of runtime bookkeeping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    pub calls: u64,
    pub arena_saves: u64,
    pub arena_restores: u64,
    pub live_allocations: usize,
    pub peak_allocations: usize,
    pub reported_errors: Vec<String>,
}

#[derive(Debug, Default)]
struct Arena {
    live: Vec<String>,
    peak: usize,
}

/// Runtime backed by native closures and a string arena.
#[derive(Debug, Default)]
pub struct NativeRuntime {
    arena: Mutex<Arena>,
    calls: AtomicU64,
    saves: AtomicU64,
    restores: AtomicU64,
    errors: Mutex<Vec<String>>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RuntimeStats {
        let arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        RuntimeStats {
            calls: self.calls.load(Ordering::Relaxed),
            arena_saves: self.saves.load(Ordering::Relaxed),
            arena_restores: self.restores.load(Ordering::Relaxed),
            live_allocations: arena.live.len(),
            peak_allocations: arena.peak,
            reported_errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

impl ScriptRuntime for NativeRuntime {
    type Closure = NativeClosure;
    type Value = String;
    type Error = String;

    fn arena_save(&self) -> ArenaIndex {
        self.saves.fetch_add(1, Ordering::Relaxed);
        let arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        ArenaIndex(arena.live.len())
    }

    fn arena_restore(&self, index: ArenaIndex) {
        self.restores.fetch_add(1, Ordering::Relaxed);
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        arena.live.truncate(index.0);
    }

    fn new_string(&self, s: &str) -> String {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        arena.live.push(s.to_string());
        arena.peak = arena.peak.max(arena.live.len());
        s.to_string()
    }

    fn call(&self, closure: &NativeClosure, args: &[String]) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        (closure.body)(args)
    }

    fn report_error(&self, error: String) {
        tracing::error!(error = %error, "script_error");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }
}
