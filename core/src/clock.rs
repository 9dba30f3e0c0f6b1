//! Clock abstraction for encounter timing
//!
//! All game-visible timestamps (cooldowns, phase starts, expiry windows) are
//! read through a `Clock` so that time-based behavior is deterministic under
//! test. Production code uses `SystemClock`; tests drive a `ManualClock`.

use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock that only moves when told to. Shared by reference so tests can
/// advance time while the engine holds the same instance.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the epoch; convenient for tests that only care about deltas.
    pub fn at_epoch() -> Self {
        Self::new(NaiveDateTime::default())
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += delta;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, to: NaiveDateTime) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock lock poisoned")
    }
}
