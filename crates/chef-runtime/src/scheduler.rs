//! Shared session handle and the two periodic tasks that drive it.

use crate::session::{EngineEvent, Intent, Session};
use crate::Clock;
use persistence::{SnapshotStore, SyncHandle, SyncStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Cloneable access to one [`Session`] plus its persistence collaborators.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    store: Arc<dyn SnapshotStore>,
    sync: Option<SyncHandle>,
    clock: Arc<dyn Clock>,
}

impl SessionHandle {
    /// Wrap a session. Work owed since load (the startup sync) is flushed
    /// immediately.
    pub fn new(
        session: Session,
        store: Arc<dyn SnapshotStore>,
        sync: Option<SyncHandle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let handle = Self {
            session: Arc::new(Mutex::new(session)),
            store,
            sync,
            clock,
        };
        {
            let mut s = handle.lock();
            handle.flush_pending(&mut s, handle.clock.now_ms());
        }
        handle
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A panicked tick leaves the state usable; keep serving it.
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn flush_pending(&self, s: &mut Session, now: i64) {
        let pending = s.take_pending();
        if pending.save {
            match s.save(self.store.as_ref(), now) {
                Ok(()) => debug!("priority save written"),
                Err(e) => warn!(error = %e, "priority save failed"),
            }
        }
        if pending.sync {
            if let Some(sync) = &self.sync {
                sync.request(s.leaderboard_record(now));
            }
        }
    }

    /// Apply an intent; a priority save runs before returning and a sync is
    /// queued without waiting for it.
    pub fn apply(&self, intent: Intent) -> bool {
        let now = self.clock.now_ms();
        let mut s = self.lock();
        let applied = s.apply(intent, now);
        self.flush_pending(&mut s, now);
        applied
    }

    pub fn fast_tick(&self) {
        let now = self.clock.now_ms();
        let mut s = self.lock();
        s.fast_tick(now);
        self.flush_pending(&mut s, now);
    }

    /// Background snapshot.
    pub fn periodic_save(&self) {
        let now = self.clock.now_ms();
        let mut s = self.lock();
        if let Err(e) = s.save(self.store.as_ref(), now) {
            warn!(error = %e, "periodic save failed");
        }
    }

    /// Settle in-flight work and write a final snapshot.
    pub fn flush(&self) {
        let now = self.clock.now_ms();
        let mut s = self.lock();
        s.settle(now);
        // The final snapshot below covers the owed save.
        let pending = s.take_pending();
        if let Err(e) = s.save(self.store.as_ref(), now) {
            warn!(error = %e, "final save failed");
        }
        if pending.sync {
            if let Some(sync) = &self.sync {
                sync.request(s.leaderboard_record(now));
            }
        }
    }

    /// Manual sync retry, the only way out of the error state.
    pub fn retry_sync(&self) -> bool {
        let Some(sync) = &self.sync else {
            return false;
        };
        let record = self.lock().leaderboard_record(self.clock.now_ms());
        sync.retry(record)
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.as_ref().map(SyncHandle::status).unwrap_or_default()
    }

    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.lock().drain_events()
    }

    /// Read from the session under the lock.
    pub fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self.lock())
    }
}

/// Fast and save tickers running on the current tokio runtime.
pub struct Scheduler {
    handle: SessionHandle,
    fast: JoinHandle<()>,
    save: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(handle: SessionHandle, tick_every: Duration, save_every: Duration) -> Self {
        info!(?tick_every, ?save_every, "scheduler starting");
        let fast = tokio::spawn(run_every(tick_every, {
            let h = handle.clone();
            move || h.fast_tick()
        }));
        let save = tokio::spawn(run_every(save_every, {
            let h = handle.clone();
            move || h.periodic_save()
        }));
        Self { handle, fast, save }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Stop both tickers, then settle and flush synchronously.
    pub async fn shutdown(self) {
        self.fast.abort();
        self.save.abort();
        for task in [self.fast, self.save] {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "ticker task failed");
                }
            }
        }
        self.handle.flush();
        info!("scheduler stopped");
    }
}

async fn run_every(period: Duration, mut f: impl FnMut()) {
    let mut iv = interval(period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    iv.tick().await;
    loop {
        iv.tick().await;
        f();
    }
}
