//! Time sources for pacing the dispatch loops.
//!
//! The poll and conductor threads never call `thread::sleep` directly; they
//! go through a [`TimeSource`] so tests can substitute a manual clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Clock and pacing abstraction.
pub trait TimeSource: Send + Sync {
    /// Microseconds since this source's epoch.
    fn now_usec(&self) -> i64;

    /// Pause the calling thread for roughly `usec` microseconds.
    fn sleep_usec(&self, usec: i64);
}

/// Wall-clock source over `Instant`.
pub struct RealTimeSource {
    epoch: Instant,
}

impl Default for RealTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RealTimeSource {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl TimeSource for RealTimeSource {
    fn now_usec(&self) -> i64 {
        self.epoch.elapsed().as_micros() as i64
    }

    fn sleep_usec(&self, usec: i64) {
        if usec > 0 {
            std::thread::sleep(Duration::from_micros(usec as u64));
        }
    }
}

/// Deterministic source whose clock advances only through sleeps or
/// explicit [`ManualTimeSource::advance`] calls.
#[derive(Default)]
pub struct ManualTimeSource {
    now_usec: AtomicI64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, usec: i64) {
        self.now_usec.fetch_add(usec, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_usec(&self) -> i64 {
        self.now_usec.load(Ordering::SeqCst)
    }

    fn sleep_usec(&self, usec: i64) {
        if usec > 0 {
            self.now_usec.fetch_add(usec, Ordering::SeqCst);
            // keep other threads schedulable under a manual clock
            std::thread::yield_now();
        }
    }
}

/// Build a source from its configured kind ("real" or "manual").
pub fn create(kind: &str) -> Result<Arc<dyn TimeSource>> {
    match kind {
        "real" => Ok(Arc::new(RealTimeSource::new())),
        "manual" => Ok(Arc::new(ManualTimeSource::new())),
        other => Err(Error::Config(format!(
            "unknown time_source_type: {other}"
        ))),
    }
}
