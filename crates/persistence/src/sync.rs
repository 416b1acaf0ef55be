//! Fire-and-forget leaderboard sync.
//!
//! Gameplay enqueues records through a [`SyncHandle`] and never waits. A
//! single worker task drains the queue, keeps only the newest record, pushes
//! it to the [`LeaderboardStore`] and publishes the outcome as a
//! [`SyncStatus`]. No failure escapes the worker. After a failure, queued
//! automatic records are dropped until a manual retry arrives.

use crate::leaderboard::{LeaderboardRecord, LeaderboardStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// How long `Success` stays visible before reverting to `Idle`.
pub const SUCCESS_DISPLAY_MS: u64 = 3_000;

/// Remote sync failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network, auth or database failure in the backend.
    #[error("leaderboard backend error: {0}")]
    Backend(String),
    /// The backend refused the record.
    #[error("leaderboard rejected record: {0}")]
    Rejected(String),
    /// The sync task stopped before reporting.
    #[error("sync task failed: {0}")]
    Aborted(String),
}

/// Sync display state.
///
/// `Idle -> Syncing -> Success -> Idle` on the happy path; `Syncing -> Error`
/// on failure, and `Error` holds until a manual retry.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error(String),
}

impl SyncStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error(_))
    }

    /// Error message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            SyncStatus::Error(m) => Some(m),
            _ => None,
        }
    }
}

/// Queued work. Automatic jobs are dropped while the worker is in the
/// error state; only a retry leaves it.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Job {
    Auto(LeaderboardRecord),
    Retry(LeaderboardRecord),
}

impl Job {
    /// Fold a newer job into this one: the newest record wins and a retry
    /// anywhere in the batch keeps the batch a retry.
    fn merge(self, newer: Job) -> Job {
        match (self, newer) {
            (Job::Retry(_), Job::Auto(r) | Job::Retry(r)) | (Job::Auto(_), Job::Retry(r)) => {
                Job::Retry(r)
            }
            (Job::Auto(_), Job::Auto(r)) => Job::Auto(r),
        }
    }

    fn is_retry(&self) -> bool {
        matches!(self, Job::Retry(_))
    }

    fn record(&self) -> &LeaderboardRecord {
        match self {
            Job::Auto(r) | Job::Retry(r) => r,
        }
    }
}

/// Cloneable front end of the sync worker.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Job>,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl SyncHandle {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn<S: LeaderboardStore>(store: S) -> Self {
        Self::spawn_with_display(store, Duration::from_millis(SUCCESS_DISPLAY_MS))
    }

    pub fn spawn_with_display<S: LeaderboardStore>(store: S, display: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        let status = Arc::new(status_tx);
        tokio::spawn(run_worker(Arc::new(store), rx, status.clone(), display));
        Self { tx, status }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Automatic sync after load or a priority save. Ignored while the
    /// status is `Error`. Returns whether the record was queued.
    pub fn request(&self, record: LeaderboardRecord) -> bool {
        // Checked and updated under the watch lock so a failure landing in
        // between cannot be overwritten.
        let mut accepted = false;
        self.status.send_if_modified(|s| {
            if s.is_error() {
                return false;
            }
            accepted = true;
            let changed = *s != SyncStatus::Syncing;
            *s = SyncStatus::Syncing;
            changed
        });
        if !accepted {
            debug!("sync in error state, waiting for manual retry");
            return false;
        }
        self.send(Job::Auto(record))
    }

    /// Manual retry: always queued, moves the status back to `Syncing`.
    pub fn retry(&self, record: LeaderboardRecord) -> bool {
        self.status.send_replace(SyncStatus::Syncing);
        self.send(Job::Retry(record))
    }

    fn send(&self, job: Job) -> bool {
        if self.tx.send(job).is_err() {
            self.status
                .send_replace(SyncStatus::Error("sync worker stopped".into()));
            return false;
        }
        true
    }
}

async fn run_worker<S: LeaderboardStore>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    status: Arc<watch::Sender<SyncStatus>>,
    display: Duration,
) {
    let generation = Arc::new(AtomicU64::new(0));
    let mut failed = false;
    while let Some(mut job) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            job = job.merge(newer);
        }
        if failed && !job.is_retry() {
            debug!("automatic sync dropped while in error state");
            continue;
        }
        failed = false;
        status.send_replace(SyncStatus::Syncing);

        let task_store = store.clone();
        let record = job.record().clone();
        let result = tokio::spawn(async move { task_store.upsert(&record).await })
            .await
            .unwrap_or_else(|e| Err(SyncError::Aborted(e.to_string())));

        match result {
            Ok(()) if !rx.is_empty() => {
                debug!("leaderboard synced, newer record queued");
            }
            Ok(()) => {
                info!("leaderboard synced");
                let ticket = generation.fetch_add(1, Ordering::SeqCst) + 1;
                status.send_replace(SyncStatus::Success);
                let status = status.clone();
                let generation = generation.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(display).await;
                    if generation.load(Ordering::SeqCst) == ticket {
                        status.send_if_modified(|s| {
                            let expire = *s == SyncStatus::Success;
                            if expire {
                                *s = SyncStatus::Idle;
                            }
                            expire
                        });
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "leaderboard sync failed");
                failed = true;
                let mut message = e.to_string();
                if message.trim().is_empty() {
                    message = "sync failed".into();
                }
                status.send_replace(SyncStatus::Error(message));
            }
        }
    }
    debug!("sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::RankedEntry;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        fail: AtomicBool,
        fail_next: AtomicBool,
        delay_ms: AtomicU64,
        calls: AtomicUsize,
        rows: Mutex<Vec<LeaderboardRecord>>,
    }

    impl LeaderboardStore for Arc<FakeStore> {
        async fn upsert(&self, record: &LeaderboardRecord) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_next.swap(false, Ordering::SeqCst) || self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::Backend("connection refused".into()));
            }
            self.rows.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn top(&self, _limit: u32) -> Result<Vec<RankedEntry>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn record(earned: i64) -> LeaderboardRecord {
        LeaderboardRecord {
            user_id: "guest_1".into(),
            username: "Guest Chef".into(),
            total_earned: earned,
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    async fn wait_for(
        rx: &mut watch::Receiver<SyncStatus>,
        pred: impl Fn(&SyncStatus) -> bool,
    ) -> SyncStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if pred(&current) {
                    return current;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("status never reached")
    }

    #[tokio::test]
    async fn success_reverts_to_idle() {
        let store = Arc::new(FakeStore::default());
        let sync = SyncHandle::spawn_with_display(store.clone(), Duration::from_millis(200));
        let mut rx = sync.subscribe();
        assert!(sync.request(record(10)));
        wait_for(&mut rx, |s| *s == SyncStatus::Success).await;
        wait_for(&mut rx, |s| *s == SyncStatus::Idle).await;
        assert_eq!(store.rows.lock().unwrap().last().unwrap().total_earned, 10);
    }

    #[tokio::test]
    async fn failure_sticks_until_manual_retry() {
        let store = Arc::new(FakeStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let sync = SyncHandle::spawn_with_display(store.clone(), Duration::from_millis(20));
        let mut rx = sync.subscribe();
        sync.request(record(1));
        let status = wait_for(&mut rx, SyncStatus::is_error).await;
        assert!(!status.message().unwrap().is_empty());

        assert!(!sync.request(record(2)));
        assert!(sync.status().is_error());

        store.fail.store(false, Ordering::SeqCst);
        assert!(sync.retry(record(3)));
        wait_for(&mut rx, |s| *s == SyncStatus::Success).await;
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_earned, 3);
    }

    #[tokio::test]
    async fn queued_requests_coalesce_to_newest() {
        let store = Arc::new(FakeStore::default());
        let sync = SyncHandle::spawn_with_display(store.clone(), Duration::from_secs(60));
        let mut rx = sync.subscribe();
        for earned in 1..=20 {
            sync.request(record(earned));
        }
        wait_for(&mut rx, |s| *s == SyncStatus::Success).await;
        // Wait until the newest record has landed.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if store.rows.lock().unwrap().last().map(|r| r.total_earned) == Some(20) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(store.rows.lock().unwrap().len() <= 20);
    }

    #[test]
    fn merged_jobs_keep_newest_record_and_retry_flag() {
        let merged = Job::Retry(record(1)).merge(Job::Auto(record(2)));
        assert_eq!(merged, Job::Retry(record(2)));
        let merged = Job::Auto(record(1)).merge(Job::Auto(record(3)));
        assert_eq!(merged, Job::Auto(record(3)));
    }

    #[tokio::test]
    async fn request_queued_behind_failing_upsert_keeps_error() {
        let store = Arc::new(FakeStore::default());
        store.fail_next.store(true, Ordering::SeqCst);
        store.delay_ms.store(100, Ordering::SeqCst);
        let sync = SyncHandle::spawn_with_display(store.clone(), Duration::from_millis(20));
        let mut rx = sync.subscribe();

        assert!(sync.request(record(1)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Still in flight, so this one is accepted into the queue.
        assert!(sync.request(record(2)));

        wait_for(&mut rx, SyncStatus::is_error).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(sync.status().is_error());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(store.rows.lock().unwrap().is_empty());

        store.delay_ms.store(0, Ordering::SeqCst);
        assert!(sync.retry(record(3)));
        wait_for(&mut rx, |s| *s == SyncStatus::Success).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.rows.lock().unwrap()[0].total_earned, 3);
    }

    #[tokio::test]
    async fn stays_syncing_while_newer_record_outstanding() {
        let store = Arc::new(FakeStore::default());
        store.delay_ms.store(150, Ordering::SeqCst);
        let sync = SyncHandle::spawn_with_display(store.clone(), Duration::from_secs(60));

        assert!(sync.request(record(1)));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(sync.request(record(2)));

        // First upsert lands; the second is still sleeping in the store.
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.rows.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sync.status(), SyncStatus::Syncing);

        let mut rx = sync.subscribe();
        wait_for(&mut rx, |s| *s == SyncStatus::Success).await;
        assert_eq!(store.rows.lock().unwrap().last().unwrap().total_earned, 2);
    }
}
