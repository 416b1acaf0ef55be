//! Shared leaderboard store.
//!
//! One row per player keyed by `user_id`; writes are upserts and the last
//! write wins.

use crate::{PersistenceError, SyncError};
use chef_core::GameState;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use tracing::info;

/// Rows returned by a ranked read unless asked otherwise.
pub const LEADERBOARD_LIMIT: u32 = 25;
/// Display name for rows stored without one.
pub const ANONYMOUS_NAME: &str = "Anonymous Chef";

/// Row written on every sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub user_id: String,
    pub username: String,
    /// Lifetime earnings, floored.
    pub total_earned: i64,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl LeaderboardRecord {
    pub fn from_state(state: &GameState, now: i64) -> Self {
        let updated_at = Utc
            .timestamp_millis_opt(now)
            .single()
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let earned = state.total_earned.floor();
        let total_earned = if earned.is_finite() && earned > 0.0 {
            // `as` saturates at i64::MAX.
            earned as i64
        } else {
            0
        };
        Self {
            user_id: state.user_id.clone(),
            username: state.username.clone(),
            total_earned,
            updated_at,
        }
    }
}

/// A row of a ranked read, rank starting at 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub user_id: String,
    pub username: String,
    pub total_earned: i64,
}

/// Remote leaderboard backend.
pub trait LeaderboardStore: Send + Sync + 'static {
    /// Insert or replace the row for `record.user_id`.
    fn upsert(&self, record: &LeaderboardRecord) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Top `limit` rows by lifetime earnings, descending.
    fn top(&self, limit: u32) -> impl Future<Output = Result<Vec<RankedEntry>, SyncError>> + Send;
}

/// Open (creating if needed) a SQLite database and run migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool, PersistenceError> {
    let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let in_memory = url.contains(":memory:");
    let mut pool_opts = SqlitePoolOptions::new();
    if in_memory {
        // Each connection would see its own empty database.
        pool_opts = pool_opts
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_opts.connect_with(opts).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "leaderboard database ready");
    Ok(pool)
}

/// SQLite-backed leaderboard.
#[derive(Clone, Debug)]
pub struct SqliteLeaderboard {
    pool: SqlitePool,
}

impl SqliteLeaderboard {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        Ok(Self::new(init_db(url).await?))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Backend(e.to_string())
    }
}

impl LeaderboardStore for SqliteLeaderboard {
    async fn upsert(&self, record: &LeaderboardRecord) -> Result<(), SyncError> {
        if record.user_id.trim().is_empty() {
            return Err(SyncError::Rejected("empty user id".into()));
        }
        sqlx::query(
            "INSERT INTO leaderboard (user_id, username, total_earned, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET \
               username = excluded.username, \
               total_earned = excluded.total_earned, \
               updated_at = excluded.updated_at",
        )
        .bind(&record.user_id)
        .bind(&record.username)
        .bind(record.total_earned)
        .bind(&record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn top(&self, limit: u32) -> Result<Vec<RankedEntry>, SyncError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT user_id, username, total_earned FROM leaderboard \
             ORDER BY total_earned DESC, updated_at ASC LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rank_rows(rows))
    }
}

fn rank_rows(rows: Vec<(String, String, i64)>) -> Vec<RankedEntry> {
    rows.into_iter()
        .zip(1u32..)
        .map(|((user_id, username, total_earned), rank)| RankedEntry {
            rank,
            user_id,
            username: if username.trim().is_empty() {
                ANONYMOUS_NAME.to_string()
            } else {
                username
            },
            total_earned,
        })
        .collect()
}
