//! Readiness signal: "the network layer is usable".
//!
//! Single writer (the dispatcher), any number of async waiters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;

use crate::types::{Error, Result};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Set/clear/wait flag backed by a `watch` channel.
#[derive(Debug)]
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
    generation: u64,
}

impl ReadinessSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Identifies this signal instance across re-creations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the signal is set. Returns at once if it already is.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| Error::internal("readiness signal closed"))
    }

    pub async fn wait_timeout(&self, limit: Duration) -> Result<()> {
        tokio::time::timeout(limit, self.wait())
            .await
            .map_err(|_| Error::timeout(format!("network not ready after {limit:?}")))?
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Holder of the one process-wide signal; replaced on every role creation.
#[derive(Debug, Default)]
pub struct SignalSlot {
    current: RwLock<Arc<ReadinessSignal>>,
}

impl SignalSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<ReadinessSignal> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a fresh, cleared signal. Waiters holding the old one keep it.
    pub fn recreate(&self) -> Arc<ReadinessSignal> {
        let fresh = Arc::new(ReadinessSignal::new());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        fresh
    }
}
