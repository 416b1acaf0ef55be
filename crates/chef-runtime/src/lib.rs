#![deny(warnings)]

//! Runtime for Chef Tycoon: the owned [`Session`], the handle that routes
//! intents to it with priority saves and leaderboard sync, and the
//! [`Scheduler`] running the fast and save tickers.

pub mod config;
pub mod scheduler;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use scheduler::{Scheduler, SessionHandle};
pub use session::{EngineEvent, HostIdentity, Intent, Pending, Session};

use std::sync::atomic::{AtomicI64, Ordering};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Time source for a session handle.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(AtomicI64::new(start_ms))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
