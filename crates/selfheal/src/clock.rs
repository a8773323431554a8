//! Clock used by retry loops to suspend between attempts.
//!
//! [`TokioClock`] really sleeps. [`RecordingClock`] returns immediately and
//! keeps the requested delays so tests can assert the wait schedule.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Suspends the current action sequence for a bounded delay
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend for `ms` milliseconds
    async fn delay(&self, ms: u64);
}

/// Clock backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn delay(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Clock that records delays instead of sleeping
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    delays: Arc<Mutex<Vec<u64>>>,
    elapsed_ms: Arc<AtomicU64>,
}

impl RecordingClock {
    /// Create a new recording clock
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, in order
    #[must_use]
    pub fn delays(&self) -> Vec<u64> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Number of delays requested
    #[must_use]
    pub fn delay_count(&self) -> usize {
        self.delays.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Total virtual time spent waiting
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }

    /// Forget recorded delays
    pub fn reset(&self) {
        if let Ok(mut d) = self.delays.lock() {
            d.clear();
        }
        self.elapsed_ms.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn delay(&self, ms: u64) {
        if let Ok(mut d) = self.delays.lock() {
            d.push(ms);
        }
        let _ = self.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    async fn delay(&self, ms: u64) {
        (**self).delay(ms).await;
    }
}
