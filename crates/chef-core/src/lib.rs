#![deny(warnings)]

//! Core domain models and invariants for Chef Tycoon.
//!
//! This crate defines the serializable player state, the static catalog
//! entities, and the pure derivation of income and click power from upgrade
//! levels. Everything else in the workspace mutates a [`GameState`] through
//! the helpers defined here.

mod catalog;

pub use catalog::{validate_catalog, Catalog, CatalogError};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Skin every player owns from the start.
pub const DEFAULT_SKIN: &str = "default_chef";
/// Display name used when the host supplies no identity.
pub const DEFAULT_USERNAME: &str = "Guest Chef";
/// Geometric growth factor of upgrade prices per level.
pub const UPGRADE_COST_GROWTH: f64 = 1.5;
/// Share of passive income added to each click.
pub const CLICK_POWER_INCOME_SHARE: f64 = 0.1;

/// Loot tier of a case item, ordered from most to least frequent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
    Exotic,
}

impl Rarity {
    /// All tiers from most to least frequent.
    pub fn all() -> &'static [Rarity] {
        &[
            Rarity::Common,
            Rarity::Uncommon,
            Rarity::Rare,
            Rarity::Legendary,
            Rarity::Exotic,
        ]
    }
}

/// An item that can drop from a case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    /// Resale value as a fraction of the case cost (>= 0).
    pub multiplier: f64,
}

/// A purchasable case with a fixed item pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnboxingCase {
    pub id: String,
    pub name: String,
    pub cost: f64,
    pub items: Vec<CaseItem>,
}

impl UnboxingCase {
    /// Items of one tier, in catalog order.
    pub fn items_of(&self, rarity: Rarity) -> Vec<&CaseItem> {
        self.items.iter().filter(|i| i.rarity == rarity).collect()
    }
}

/// Upgrade category, shown as a label in the shop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeKind {
    Staff,
    Equipment,
}

/// A production upgrade that can be bought repeatedly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    pub id: String,
    pub name: String,
    /// Price of level 1.
    pub base_cost: f64,
    /// Passive income added per level, per second.
    pub income_per_sec: f64,
    pub kind: UpgradeKind,
}

/// A cosmetic chef skin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub id: String,
    pub name: String,
    pub cost: f64,
}

/// An owned case item, created when a reveal completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Unique per player.
    pub id: String,
    pub item: CaseItem,
    /// Cost of the case this item came from.
    pub purchase_price: f64,
    /// Epoch milliseconds.
    pub unboxed_at: i64,
}

/// Time-boxed income and click multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Boost {
    pub multiplier: f64,
    /// Epoch milliseconds; the boost has no effect once `end_time <= now`.
    pub end_time: i64,
}

/// Income figures derived from upgrade levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedEconomy {
    pub passive_income: f64,
    pub click_power: f64,
}

/// Recompute passive income and click power from the full upgrade table.
///
/// Unknown ids in `upgrades` contribute nothing.
pub fn derive_economy(upgrades: &BTreeMap<String, u32>, catalog: &Catalog) -> DerivedEconomy {
    let passive_income: f64 = catalog
        .upgrades
        .iter()
        .map(|u| f64::from(upgrades.get(&u.id).copied().unwrap_or(0)) * u.income_per_sec)
        .sum();
    DerivedEconomy {
        passive_income,
        click_power: 1.0 + (passive_income * CLICK_POWER_INCOME_SHARE).floor(),
    }
}

/// Player state for one session. Missing fields default when deserializing,
/// so an older snapshot merges over a fresh state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub user_id: String,
    pub username: String,
    pub balance: f64,
    /// Lifetime gross income; never decreases.
    pub total_earned: f64,
    pub passive_income: f64,
    pub click_power: f64,
    pub upgrades: BTreeMap<String, u32>,
    pub owned_skins: BTreeSet<String>,
    pub active_skin: String,
    /// Newest first.
    pub inventory: Vec<InventoryItem>,
    pub active_boost: Option<Boost>,
    /// Epoch milliseconds of the last snapshot.
    pub last_saved: i64,
    /// Epoch milliseconds of the last daily claim, 0 when never claimed.
    pub last_daily_claim: i64,
    pub daily_streak: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            username: DEFAULT_USERNAME.to_string(),
            balance: 0.0,
            total_earned: 0.0,
            passive_income: 0.0,
            click_power: 1.0,
            upgrades: BTreeMap::new(),
            owned_skins: BTreeSet::from([DEFAULT_SKIN.to_string()]),
            active_skin: DEFAULT_SKIN.to_string(),
            inventory: Vec::new(),
            active_boost: None,
            last_saved: 0,
            last_daily_claim: 0,
            daily_streak: 0,
        }
    }
}

impl GameState {
    /// Fresh state with a generated guest identity.
    pub fn new_guest<R: Rng + ?Sized>(rng: &mut R, now: i64) -> Self {
        Self {
            user_id: generate_guest_id(rng),
            last_saved: now,
            ..Self::default()
        }
    }

    /// Current level of an upgrade (0 when never bought).
    pub fn level_of(&self, upgrade_id: &str) -> u32 {
        self.upgrades.get(upgrade_id).copied().unwrap_or(0)
    }

    /// Recompute `passive_income` and `click_power` together.
    pub fn apply_derived(&mut self, catalog: &Catalog) {
        let d = derive_economy(&self.upgrades, catalog);
        self.passive_income = d.passive_income;
        self.click_power = d.click_power;
    }

    /// Credit income: balance and lifetime earnings both grow.
    /// Non-positive or non-finite amounts are ignored.
    pub fn earn(&mut self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.balance += amount;
            self.total_earned += amount;
        }
    }

    /// Credit a sale or payout that does not count as earnings.
    pub fn credit(&mut self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.balance += amount;
        }
    }

    /// Deduct `amount` if affordable. Returns whether the debit happened.
    pub fn try_debit(&mut self, amount: f64) -> bool {
        if !amount.is_finite() || amount < 0.0 || self.balance < amount {
            return false;
        }
        self.balance = (self.balance - amount).max(0.0);
        true
    }

    /// Restore invariants on state read from an untrusted snapshot.
    ///
    /// Drops unknown upgrades, re-derives the economy, clamps money and
    /// guarantees the default skin is owned and the active skin is owned.
    pub fn repair(&mut self, catalog: &Catalog) {
        let before = self.upgrades.len();
        self.upgrades.retain(|id, _| catalog.upgrade(id).is_some());
        if self.upgrades.len() != before {
            warn!(dropped = before - self.upgrades.len(), "unknown upgrades in snapshot");
        }
        self.apply_derived(catalog);

        if !self.balance.is_finite() || self.balance < 0.0 {
            self.balance = 0.0;
        }
        if !self.total_earned.is_finite() || self.total_earned < 0.0 {
            self.total_earned = 0.0;
        }
        self.owned_skins.insert(DEFAULT_SKIN.to_string());
        if !self.owned_skins.contains(&self.active_skin) {
            self.active_skin = DEFAULT_SKIN.to_string();
        }
        if self.username.trim().is_empty() {
            self.username = DEFAULT_USERNAME.to_string();
        }
    }
}

/// Random base-36 token, used for guest ids and inventory entry ids.
pub fn random_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Stable-looking guest identity, generated once per save.
pub fn generate_guest_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("guest_{}", random_token(rng, 12))
}
