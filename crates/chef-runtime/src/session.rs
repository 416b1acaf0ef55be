//! The single owned game session.
//!
//! A [`Session`] holds the player state together with the controllers that
//! act on it. Every operation takes the current time explicitly; presentation
//! events accumulate in a bounded queue until drained.

use crate::config::SessionConfig;
use chef_casino::{ledger, UnboxingEngine};
use chef_core::{Catalog, GameState, InventoryItem};
use chef_econ::boost::{self, AD_BOOST_DURATION_MS};
use chef_econ::combo::{ComboFrenzy, FrenzyTransition};
use chef_econ::ClickPop;
use persistence::{save_game, LeaderboardRecord, LoadReport, PersistenceError, SnapshotStore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// Oldest events are dropped beyond this many undrained entries.
pub const MAX_PENDING_EVENTS: usize = 256;

/// Identity supplied by the host platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostIdentity {
    pub id: String,
    pub display_name: String,
}

/// Things a presentation layer may want to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    ClickPop(ClickPop),
    FrenzyStarted,
    FrenzyEnded,
    RevealStarted {
        case_id: String,
        winner_id: String,
        ends_at: i64,
    },
    RevealFinished(InventoryItem),
    OfflineIncome {
        amount: f64,
        elapsed_secs: i64,
    },
    DailyClaimed {
        reward: f64,
        streak: u32,
    },
    BoostGranted {
        end_time: i64,
    },
}

/// Player actions routed through a session handle.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Click { x: f32, y: f32 },
    BuyUpgrade(String),
    BuySkin(String),
    EquipSkin(String),
    OpenCase(String),
    Sell(String),
    SellAll,
    Cook,
    ClaimDaily,
    /// Outcome of a rewarded ad; `false` changes nothing.
    AdReward { granted: bool },
    Wager(f64),
}

/// Persistence work owed after the last intents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pending {
    pub save: bool,
    pub sync: bool,
}

impl Pending {
    pub fn is_empty(&self) -> bool {
        !self.save && !self.sync
    }
}

pub struct Session {
    state: GameState,
    catalog: Arc<Catalog>,
    combo: ComboFrenzy,
    unboxing: UnboxingEngine,
    rng: ChaCha8Rng,
    tick_fraction: f64,
    events: VecDeque<EngineEvent>,
    pending: Pending,
}

impl Session {
    pub fn new(state: GameState, catalog: Arc<Catalog>, cfg: &SessionConfig) -> Self {
        let rng = match cfg.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(state, catalog, cfg, rng)
    }

    fn with_rng(
        state: GameState,
        catalog: Arc<Catalog>,
        cfg: &SessionConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            state,
            catalog,
            combo: ComboFrenzy::new(cfg.combo.clone()),
            unboxing: UnboxingEngine::new(cfg.reveal_ms),
            rng,
            tick_fraction: cfg.tick_fraction(),
            events: VecDeque::new(),
            pending: Pending::default(),
        }
    }

    /// Load the stored snapshot (reconciling offline income) and build a
    /// session around it. A sync is owed right away.
    pub fn load<S: SnapshotStore + ?Sized>(
        store: &S,
        catalog: Arc<Catalog>,
        cfg: &SessionConfig,
        host: Option<HostIdentity>,
        now: i64,
    ) -> Self {
        let mut rng = match cfg.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let report = persistence::load_game(store, &catalog, now, &mut rng);
        let mut session = Self::with_rng(report.state.clone(), catalog, cfg, rng);
        session.adopt_report(&report, host);
        session
    }

    fn adopt_report(&mut self, report: &LoadReport, host: Option<HostIdentity>) {
        // A blank host id would be rejected by the leaderboard; keep the
        // guest identity instead.
        if let Some(host) = host.filter(|h| !h.id.trim().is_empty()) {
            info!(user_id = %host.id, "host identity applied");
            self.state.user_id = host.id;
            if !host.display_name.trim().is_empty() {
                self.state.username = host.display_name;
            }
        }
        if report.offline_income > 0.0 {
            self.push(EngineEvent::OfflineIncome {
                amount: report.offline_income,
                elapsed_secs: report.elapsed_secs,
            });
        }
        self.pending = Pending {
            save: report.recovered,
            sync: true,
        };
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn combo(&self) -> &ComboFrenzy {
        &self.combo
    }

    pub fn unboxing(&self) -> &UnboxingEngine {
        &self.unboxing
    }

    fn push(&mut self, event: EngineEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn push_frenzy(&mut self, transition: Option<FrenzyTransition>) {
        match transition {
            Some(FrenzyTransition::Started) => self.push(EngineEvent::FrenzyStarted),
            Some(FrenzyTransition::Ended) => self.push(EngineEvent::FrenzyEnded),
            None => {}
        }
    }

    fn mark_transaction(&mut self) {
        self.pending.save = true;
        self.pending.sync = true;
    }

    /// Dispatch an intent. Returns whether it was applied.
    pub fn apply(&mut self, intent: Intent, now: i64) -> bool {
        match intent {
            Intent::Click { x, y } => {
                self.click(x, y, now);
                true
            }
            Intent::BuyUpgrade(id) => self.buy_upgrade(&id),
            Intent::BuySkin(id) => self.buy_skin(&id),
            Intent::EquipSkin(id) => self.equip_skin(&id),
            Intent::OpenCase(id) => self.open_case(&id, now),
            Intent::Sell(id) => self.sell(&id),
            Intent::SellAll => self.sell_all(),
            Intent::Cook => self.cook(),
            Intent::ClaimDaily => self.claim_daily(now),
            Intent::AdReward { granted } => granted && self.grant_ad_boost(now),
            Intent::Wager(amount) => self.wager(amount),
        }
    }

    /// Manual click. Covered by the periodic save rather than a priority one.
    pub fn click(&mut self, x: f32, y: f32, now: i64) -> ClickPop {
        let outcome =
            chef_econ::resolve_click(&mut self.state, &mut self.combo, x, y, now, &mut self.rng);
        self.push(EngineEvent::ClickPop(outcome.pop));
        self.push_frenzy(outcome.frenzy);
        outcome.pop
    }

    pub fn buy_upgrade(&mut self, id: &str) -> bool {
        let ok = chef_econ::purchase_upgrade(&mut self.state, &self.catalog, id);
        if ok {
            info!(upgrade = id, level = self.state.level_of(id), "upgrade purchased");
            self.mark_transaction();
        }
        ok
    }

    pub fn buy_skin(&mut self, id: &str) -> bool {
        let ok = chef_econ::purchase_skin(&mut self.state, &self.catalog, id);
        if ok {
            info!(skin = id, "skin purchased");
            self.mark_transaction();
        }
        ok
    }

    pub fn equip_skin(&mut self, id: &str) -> bool {
        let ok = chef_econ::equip_skin(&mut self.state, id);
        if ok {
            self.pending.save = true;
        }
        ok
    }

    pub fn open_case(&mut self, id: &str, now: i64) -> bool {
        let Some(case) = self.catalog.case(id) else {
            debug!(case_id = id, "unknown case");
            return false;
        };
        let started = self
            .unboxing
            .open(&mut self.state, case, now, &mut self.rng)
            .map(|r| EngineEvent::RevealStarted {
                case_id: r.case_id.clone(),
                winner_id: r.winner.id.clone(),
                ends_at: r.ends_at,
            });
        match started {
            Some(event) => {
                self.push(event);
                self.mark_transaction();
                true
            }
            None => false,
        }
    }

    pub fn sell(&mut self, id: &str) -> bool {
        let sold = ledger::sell(&mut self.state, id);
        if sold.is_some() {
            self.mark_transaction();
        }
        sold.is_some()
    }

    pub fn sell_all(&mut self) -> bool {
        let sold = ledger::sell_all(&mut self.state);
        if sold.is_some() {
            self.mark_transaction();
        }
        sold.is_some()
    }

    pub fn cook(&mut self) -> bool {
        let payout = ledger::cook(&mut self.state);
        if payout.is_some() {
            self.mark_transaction();
        }
        payout.is_some()
    }

    pub fn claim_daily(&mut self, now: i64) -> bool {
        let Some(reward) = chef_econ::claim_daily(&mut self.state, now) else {
            return false;
        };
        self.push(EngineEvent::DailyClaimed {
            reward,
            streak: self.state.daily_streak,
        });
        self.mark_transaction();
        true
    }

    /// Reward for a completed ad. The boost is persisted but does not move
    /// lifetime earnings, so no sync is owed.
    pub fn grant_ad_boost(&mut self, now: i64) -> bool {
        boost::grant_boost(&mut self.state, AD_BOOST_DURATION_MS, now);
        if let Some(b) = self.state.active_boost {
            self.push(EngineEvent::BoostGranted {
                end_time: b.end_time,
            });
        }
        self.pending.save = true;
        true
    }

    /// Casino mini-game result: a signed balance change.
    pub fn wager(&mut self, amount: f64) -> bool {
        if !amount.is_finite() || amount == 0.0 {
            debug!(amount, "wager ignored");
            return false;
        }
        chef_econ::adjust_balance(&mut self.state, amount);
        self.mark_transaction();
        true
    }

    /// One fast tick: passive income, combo decay, reveal completion.
    pub fn fast_tick(&mut self, now: i64) {
        chef_econ::tick(&mut self.state, self.tick_fraction, now);
        let transition = self.combo.decay(now);
        self.push_frenzy(transition);
        if let Some(entry) = self.unboxing.poll(&mut self.state, now, &mut self.rng) {
            self.push(EngineEvent::RevealFinished(entry));
            self.mark_transaction();
        }
    }

    /// Settle anything in flight before teardown.
    pub fn settle(&mut self, now: i64) {
        if let Some(entry) = self.unboxing.finish_now(&mut self.state, now, &mut self.rng) {
            self.push(EngineEvent::RevealFinished(entry));
            self.mark_transaction();
        }
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Take and clear the owed persistence work.
    pub fn take_pending(&mut self) -> Pending {
        std::mem::take(&mut self.pending)
    }

    pub fn save<S: SnapshotStore + ?Sized>(
        &mut self,
        store: &S,
        now: i64,
    ) -> Result<(), PersistenceError> {
        save_game(store, &mut self.state, now)
    }

    pub fn leaderboard_record(&self, now: i64) -> LeaderboardRecord {
        LeaderboardRecord::from_state(&self.state, now)
    }
}
