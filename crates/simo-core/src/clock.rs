//! Monotonic time and one-shot timers.
//!
//! Every timer in the pipeline (auto-revert, confirmation timeout, fluency TTL)
//! is a [`OneShotTimer`] polled against a [`Clock`], so tests can drive time
//! with a [`ManualClock`] instead of sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::types::Millis;

/// Source of monotonic milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall-independent clock anchored at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// A cancellable deadline that fires at most once per arming.
///
/// Re-arming replaces the old deadline, so a deadline armed earlier can never
/// fire on behalf of a later one.
#[derive(Debug, Clone, Default)]
pub struct OneShotTimer {
    due: Option<Millis>,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) for `due`.
    pub fn arm(&mut self, due: Millis) {
        self.due = Some(due);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    pub fn due(&self) -> Option<Millis> {
        self.due
    }

    /// Time left before firing, if armed.
    pub fn remaining(&self, now: Millis) -> Option<Millis> {
        self.due.map(|due| due.saturating_sub(now))
    }

    /// Disarm and return true if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Millis) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}
