#![deny(warnings)]

use persistence::{default_sqlite_url, ensure_sqlite_dir, init_db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    ensure_sqlite_dir(&url)?;
    let pool = init_db(&url).await?;
    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leaderboard")
        .fetch_one(&pool)
        .await?;
    println!("Leaderboard ready at {url} ({rows} players)");
    Ok(())
}
