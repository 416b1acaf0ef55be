#![deny(warnings)]

//! Headless driver: loads (or creates) a save, runs the tickers for a while
//! with a simple auto-player issuing intents, then prints a summary.

use anyhow::{Context, Result};
use chef_core::Catalog;
use chef_runtime::{
    EngineEvent, HostIdentity, Intent, Scheduler, Session, SessionConfig, SessionHandle,
    SystemClock,
};
use persistence::leaderboard::LEADERBOARD_LIMIT;
use persistence::{FileSnapshotStore, LeaderboardStore, SqliteLeaderboard, SyncHandle, SyncStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    save_dir: Option<String>,
    db: Option<String>,
    name: Option<String>,
    seconds: Option<u64>,
    clicks: Option<u32>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--save-dir" => args.save_dir = it.next(),
            "--db" => args.db = it.next(),
            "--name" => args.name = it.next(),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--clicks" => args.clicks = it.next().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    args
}

#[derive(Debug, Default)]
struct Tally {
    pops: u32,
    crits: u32,
    frenzies: u32,
    reveals: u32,
    offline: f64,
}

impl Tally {
    fn absorb(&mut self, events: Vec<EngineEvent>) {
        for e in events {
            match e {
                EngineEvent::ClickPop(p) => {
                    self.pops += 1;
                    if p.is_crit {
                        self.crits += 1;
                    }
                }
                EngineEvent::FrenzyStarted => self.frenzies += 1,
                EngineEvent::RevealFinished(entry) => {
                    self.reveals += 1;
                    info!(item = %entry.item.name, rarity = ?entry.item.rarity, "unboxed");
                }
                EngineEvent::OfflineIncome { amount, .. } => self.offline += amount,
                _ => {}
            }
        }
    }
}

/// Cheapest upgrade the player can afford right now.
fn affordable_upgrade(s: &Session) -> Option<String> {
    s.catalog()
        .upgrades
        .iter()
        .filter_map(|u| {
            chef_econ::price_of(s.state(), s.catalog(), &u.id).map(|p| (p, u.id.clone()))
        })
        .filter(|(p, _)| *p <= s.state().balance)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}

/// Most expensive case the player can afford while none is opening.
fn affordable_case(s: &Session) -> Option<String> {
    if s.unboxing().is_revealing() {
        return None;
    }
    s.catalog()
        .cases
        .iter()
        .filter(|c| c.cost <= s.state().balance * 0.25)
        .max_by(|a, b| a.cost.total_cmp(&b.cost))
        .map(|c| c.id.clone())
}

/// One round of auto-player decisions.
fn play_round(handle: &SessionHandle) {
    handle.apply(Intent::ClaimDaily);
    while let Some(id) = handle.with_session(affordable_upgrade) {
        if !handle.apply(Intent::BuyUpgrade(id)) {
            break;
        }
    }
    if let Some(id) = handle.with_session(affordable_case) {
        handle.apply(Intent::OpenCase(id));
    }
    if handle.with_session(|s| s.state().inventory.len()) >= chef_casino::ledger::COOK_BATCH {
        handle.apply(Intent::Cook);
    }
}

async fn wait_for_sync(handle: &SessionHandle) {
    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while handle.sync_status() == SyncStatus::Syncing {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(?args, version = env!("GIT_SHA"), "starting chef-tycoon");

    let mut cfg = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("loading config {path}"))?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = args.save_dir.clone() {
        cfg.save_dir = dir;
    }
    if let Some(url) = args.db.clone() {
        cfg.leaderboard_url = url;
    }
    let catalog = Arc::new(Catalog::builtin().context("loading catalog")?);

    let (leaderboard, sync) = if cfg.leaderboard_url.is_empty() {
        (None, None)
    } else {
        persistence::ensure_sqlite_dir(&cfg.leaderboard_url)
            .context("creating leaderboard directory")?;
        match SqliteLeaderboard::connect(&cfg.leaderboard_url).await {
            Ok(lb) => {
                let sync = SyncHandle::spawn_with_display(
                    lb.clone(),
                    Duration::from_millis(cfg.sync_success_ms),
                );
                (Some(lb), Some(sync))
            }
            Err(e) => {
                warn!(error = %e, "leaderboard unavailable, playing offline");
                (None, None)
            }
        }
    };

    let store = Arc::new(FileSnapshotStore::new(&cfg.save_dir));
    let host = args.name.clone().map(|name| HostIdentity {
        id: format!("cli_{}", name.to_lowercase().replace(' ', "_")),
        display_name: name,
    });
    let session = Session::load(
        store.as_ref(),
        catalog,
        &cfg,
        host,
        chef_runtime::now_ms(),
    );
    let handle = SessionHandle::new(session, store, sync, Arc::new(SystemClock));
    let scheduler = Scheduler::spawn(
        handle.clone(),
        Duration::from_millis(cfg.tick_ms),
        Duration::from_millis(cfg.save_ms),
    );

    let seconds = args.seconds.unwrap_or(10);
    let clicks = args.clicks.unwrap_or(50);
    let per_second = clicks.div_ceil(seconds.max(1) as u32).max(1);
    let gap = Duration::from_millis(1000 / u64::from(per_second));
    let mut tally = Tally::default();
    let mut remaining = clicks;

    let play = async {
        let mut pace = tokio::time::interval(Duration::from_secs(1));
        for second in 0..seconds {
            pace.tick().await;
            for i in 0..per_second.min(remaining) {
                let (x, y) = ((i * 37 % 300) as f32, (second * 53 % 300) as f32);
                handle.apply(Intent::Click { x, y });
                remaining -= 1;
                tokio::time::sleep(gap).await;
            }
            play_round(&handle);
            tally.absorb(handle.drain_events());
        }
    };
    tokio::select! {
        _ = play => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    scheduler.shutdown().await;
    tally.absorb(handle.drain_events());
    wait_for_sync(&handle).await;

    let (state, combo) = handle.with_session(|s| (s.state().clone(), s.combo().combo()));
    println!(
        "Chef {} ({}) | balance: {:.0} | earned: {:.0} | income: {:.1}/s | click: {:.0}",
        state.username,
        state.user_id,
        state.balance,
        state.total_earned,
        state.passive_income,
        state.click_power
    );
    println!(
        "Session | pops: {} | crits: {} | frenzies: {} | reveals: {} | offline: {:.0} | combo: {:.1}",
        tally.pops, tally.crits, tally.frenzies, tally.reveals, tally.offline, combo
    );
    println!(
        "Kitchen | upgrades: {} | skins: {} | inventory: {} (worth {:.0}) | streak: {}",
        state.upgrades.values().sum::<u32>(),
        state.owned_skins.len(),
        state.inventory.len(),
        chef_casino::total_value(&state),
        state.daily_streak
    );
    match handle.sync_status() {
        SyncStatus::Error(msg) => println!("Sync | error: {msg}"),
        other => println!("Sync | {other:?}"),
    }
    if let Some(lb) = leaderboard {
        let top = lb
            .top(LEADERBOARD_LIMIT)
            .await
            .context("reading leaderboard")?;
        for row in top {
            println!("#{} {} {}", row.rank, row.username, row.total_earned);
        }
    }
    Ok(())
}
