#![deny(warnings)]

//! Persistence layer: local snapshots, offline reconciliation and the
//! best-effort leaderboard sync.

pub mod leaderboard;
pub mod snapshot;
pub mod sync;

pub use leaderboard::{
    init_db, LeaderboardRecord, LeaderboardStore, RankedEntry, SqliteLeaderboard,
};
pub use snapshot::{
    load_game, offline_income, save_game, FileSnapshotStore, LoadReport, MemorySnapshotStore,
    SnapshotStore, SAVE_KEY,
};
pub use sync::{SyncError, SyncHandle, SyncStatus};

use thiserror::Error;

/// Returns the default SQLite URL used for the leaderboard.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/leaderboard.db"
}

/// Returns the default directory for local snapshots.
pub fn default_save_dir() -> &'static str {
    "./saves"
}

/// Create the directory holding a file-backed SQLite database. SQLite
/// creates the file itself but not its parent.
pub fn ensure_sqlite_dir(url: &str) -> std::io::Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .filter(|p| !p.contains(":memory:"));
    match path.and_then(|p| std::path::Path::new(p).parent()) {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Local storage failures. Callers log these; gameplay continues.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("migration error: {0}")]
    Migrate(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        PersistenceError::Database(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PersistenceError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        PersistenceError::Migrate(e.to_string())
    }
}
