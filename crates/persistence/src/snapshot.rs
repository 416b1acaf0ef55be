//! Local snapshot store and load-time reconciliation.
//!
//! A snapshot is the whole [`GameState`] as JSON under one fixed, versioned
//! key. Missing fields merge over defaults; anything unparseable is
//! discarded in favour of a fresh state.

use crate::PersistenceError;
use chef_core::{generate_guest_id, Catalog, GameState};
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Storage key; bump the suffix to invalidate old saves.
pub const SAVE_KEY: &str = "master_chef_save_v1";
/// Offline income is capped at four hours of production.
pub const OFFLINE_CAP_SECS: i64 = 4 * 60 * 60;

/// Keyed storage for serialized snapshots.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn save(&self, key: &str, payload: &str) -> Result<(), PersistenceError>;
}

/// One JSON file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process store, used by tests and headless runs without a save dir.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `key`, bypassing serialization.
    pub fn put_raw(&self, key: &str, payload: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.to_string(), payload.to_string());
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn save(&self, key: &str, payload: &str) -> Result<(), PersistenceError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        slots.insert(key.to_string(), payload.to_string());
        Ok(())
    }
}

/// Outcome of loading a save at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    pub state: GameState,
    /// Income granted for the time away.
    pub offline_income: f64,
    /// Whole seconds since the previous snapshot.
    pub elapsed_secs: i64,
    /// True when a stored snapshot was unreadable and replaced.
    pub recovered: bool,
}

/// Income for `elapsed_secs` away, capped at [`OFFLINE_CAP_SECS`].
pub fn offline_income(passive_income: f64, elapsed_secs: i64) -> f64 {
    let secs = elapsed_secs.clamp(0, OFFLINE_CAP_SECS);
    passive_income * secs as f64
}

/// Load the player state, reconciling time spent offline.
///
/// Never fails: an unreadable or malformed snapshot yields a fresh guest
/// state and `recovered = true`.
pub fn load_game<S, R>(store: &S, catalog: &Catalog, now: i64, rng: &mut R) -> LoadReport
where
    S: SnapshotStore + ?Sized,
    R: Rng + ?Sized,
{
    let raw = match store.load(SAVE_KEY) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "snapshot unreadable, starting fresh");
            return fresh(now, rng, true);
        }
    };
    let Some(text) = raw else {
        info!("no snapshot found, starting fresh");
        return fresh(now, rng, false);
    };
    let mut state: GameState = match serde_json::from_str(&text) {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "malformed snapshot discarded");
            return fresh(now, rng, true);
        }
    };

    state.repair(catalog);
    if state.user_id.trim().is_empty() {
        state.user_id = generate_guest_id(rng);
    }

    let elapsed_secs = if state.last_saved > 0 {
        (now - state.last_saved).max(0) / 1000
    } else {
        0
    };
    let income = offline_income(state.passive_income, elapsed_secs);
    state.earn(income);
    state.last_saved = now;
    info!(elapsed_secs, offline_income = income, "snapshot loaded");
    LoadReport {
        state,
        offline_income: income,
        elapsed_secs,
        recovered: false,
    }
}

fn fresh<R: Rng + ?Sized>(now: i64, rng: &mut R, recovered: bool) -> LoadReport {
    LoadReport {
        state: GameState::new_guest(rng, now),
        offline_income: 0.0,
        elapsed_secs: 0,
        recovered,
    }
}

/// Stamp `last_saved` and write the snapshot.
pub fn save_game<S: SnapshotStore + ?Sized>(
    store: &S,
    state: &mut GameState,
    now: i64,
) -> Result<(), PersistenceError> {
    state.last_saved = now;
    let payload =
        serde_json::to_string(state).map_err(|e| PersistenceError::Encode(e.to_string()))?;
    store.save(SAVE_KEY, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chef_core::{CaseItem, InventoryItem, Rarity};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const HOUR_MS: i64 = 3_600_000;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(99)
    }

    /// A saved state producing 10 per second.
    fn saved_state(last_saved: i64) -> GameState {
        let mut s = GameState {
            user_id: "guest_abc".into(),
            balance: 100.0,
            total_earned: 500.0,
            last_saved,
            ..GameState::default()
        };
        s.upgrades.insert("intern_chef".into(), 10);
        s.apply_derived(&catalog());
        s
    }

    #[test]
    fn offline_income_is_capped_at_four_hours() {
        let store = MemorySnapshotStore::new();
        let mut s = saved_state(0);
        save_game(&store, &mut s, HOUR_MS).unwrap();
        let now = HOUR_MS + 5 * HOUR_MS;
        let report = load_game(&store, &catalog(), now, &mut rng());
        assert_eq!(report.elapsed_secs, 5 * 3600);
        assert_eq!(report.offline_income, 144_000.0);
        assert_eq!(report.state.balance, 100.0 + 144_000.0);
        assert_eq!(report.state.total_earned, 500.0 + 144_000.0);
        assert_eq!(report.state.last_saved, now);
        assert!(!report.recovered);
    }

    #[test]
    fn short_absence_pays_per_second() {
        let store = MemorySnapshotStore::new();
        let mut s = saved_state(0);
        save_game(&store, &mut s, 1_000).unwrap();
        let report = load_game(&store, &catalog(), 1_000 + 90_500, &mut rng());
        assert_eq!(report.elapsed_secs, 90);
        assert_eq!(report.offline_income, 900.0);
    }

    #[test]
    fn clock_skew_grants_nothing() {
        let store = MemorySnapshotStore::new();
        let mut s = saved_state(0);
        save_game(&store, &mut s, 10 * HOUR_MS).unwrap();
        let report = load_game(&store, &catalog(), HOUR_MS, &mut rng());
        assert_eq!(report.offline_income, 0.0);
        assert_eq!(report.state.balance, 100.0);
    }

    #[test]
    fn malformed_snapshot_starts_fresh() {
        for junk in ["{not json", "[1, 2, 3]", r#"{"balance": "lots"}"#, ""] {
            let store = MemorySnapshotStore::new();
            store.put_raw(SAVE_KEY, junk);
            let report = load_game(&store, &catalog(), 5_000, &mut rng());
            assert!(report.recovered, "{junk:?}");
            assert_eq!(report.state.balance, 0.0);
            assert!(report.state.user_id.starts_with("guest_"));
            assert_eq!(report.state.last_saved, 5_000);
        }
    }

    #[test]
    fn missing_snapshot_is_not_a_recovery() {
        let store = MemorySnapshotStore::new();
        let report = load_game(&store, &catalog(), 5_000, &mut rng());
        assert!(!report.recovered);
        assert_eq!(report.state.click_power, 1.0);
    }

    #[test]
    fn save_and_load_keep_inventory_order() {
        let store = MemorySnapshotStore::new();
        let mut s = saved_state(0);
        for (i, id) in ["newest", "middle", "oldest"].iter().enumerate() {
            s.inventory.push(InventoryItem {
                id: (*id).into(),
                item: CaseItem {
                    id: "egg".into(),
                    name: "Free Range Egg".into(),
                    rarity: Rarity::Uncommon,
                    multiplier: 1.2,
                },
                purchase_price: 50.0,
                unboxed_at: 100 - i as i64,
            });
        }
        save_game(&store, &mut s, 1_000).unwrap();
        let back = load_game(&store, &catalog(), 1_000, &mut rng()).state;
        let ids: Vec<_> = back.inventory.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["newest", "middle", "oldest"]);
        assert_eq!(back.user_id, "guest_abc");
    }

    #[test]
    fn file_store_roundtrip_and_missing_key() {
        let dir = std::env::temp_dir().join(format!("chef-snapshots-{}", std::process::id()));
        let store = FileSnapshotStore::new(&dir);
        assert_eq!(store.load("absent").unwrap(), None);
        store.save("slot", r#"{"balance": 3}"#).unwrap();
        store.save("slot", r#"{"balance": 4}"#).unwrap();
        assert_eq!(store.load("slot").unwrap().as_deref(), Some(r#"{"balance": 4}"#));
        assert!(!store.path_for("slot").with_extension("json.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    proptest! {
        #[test]
        fn offline_income_never_exceeds_cap(p in 0.0f64..1e6, secs in -10_000i64..1_000_000) {
            let got = offline_income(p, secs);
            prop_assert!(got >= 0.0);
            prop_assert!(got <= p * OFFLINE_CAP_SECS as f64);
            if (0..=OFFLINE_CAP_SECS).contains(&secs) {
                prop_assert_eq!(got, p * secs as f64);
            }
        }
    }
}
