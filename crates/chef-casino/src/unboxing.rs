//! Case openings: weighted reel generation and the timed reveal.
//!
//! Only one opening runs at a time. The case cost is debited when the reveal
//! starts; the winning item reaches the inventory when the reveal ends.

use chef_core::{random_token, CaseItem, GameState, InventoryItem, Rarity, UnboxingCase};
use rand::Rng;
use tracing::{debug, info};

/// Slots in a generated reel.
pub const REEL_LENGTH: usize = 60;
/// Slot whose item is paid out.
pub const WINNING_INDEX: usize = 50;
/// Duration of the reveal in the reference timing.
pub const REVEAL_DURATION_MS: i64 = 8_100;

/// Cumulative tier thresholds on a draw in `[0, 100)`, rarest first.
/// Anything at or above the last threshold is common.
pub const RARITY_THRESHOLDS: [(Rarity, f64); 4] = [
    (Rarity::Exotic, 0.5),
    (Rarity::Legendary, 5.0),
    (Rarity::Rare, 15.0),
    (Rarity::Uncommon, 40.0),
];

/// A case pool split by tier.
struct Tiers<'a> {
    pool: &'a UnboxingCase,
    by_rarity: [Vec<&'a CaseItem>; 5],
}

impl<'a> Tiers<'a> {
    fn new(pool: &'a UnboxingCase) -> Self {
        let mut by_rarity: [Vec<&CaseItem>; 5] = Default::default();
        for item in &pool.items {
            by_rarity[tier_index(item.rarity)].push(item);
        }
        Self { pool, by_rarity }
    }

    fn get(&self, rarity: Rarity) -> &[&'a CaseItem] {
        &self.by_rarity[tier_index(rarity)]
    }

    /// Pick one slot item. A tier that is empty for this pool falls through
    /// to the next threshold, then to common, then to the first pool item.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&'a CaseItem> {
        let draw: f64 = rng.gen_range(0.0..100.0);
        let tier = RARITY_THRESHOLDS
            .iter()
            .find(|(r, limit)| draw < *limit && !self.get(*r).is_empty())
            .map(|(r, _)| *r)
            .unwrap_or(Rarity::Common);
        let items = self.get(tier);
        if items.is_empty() {
            return self.pool.items.first();
        }
        Some(items[rng.gen_range(0..items.len())])
    }
}

fn tier_index(r: Rarity) -> usize {
    match r {
        Rarity::Common => 0,
        Rarity::Uncommon => 1,
        Rarity::Rare => 2,
        Rarity::Legendary => 3,
        Rarity::Exotic => 4,
    }
}

/// Tier for a raw draw in `[0, 100)` when every tier is stocked.
pub fn rarity_for_draw(draw: f64) -> Rarity {
    RARITY_THRESHOLDS
        .iter()
        .find(|(_, limit)| draw < *limit)
        .map(|(r, _)| *r)
        .unwrap_or(Rarity::Common)
}

/// Build a reel of `length` independently sampled slots.
///
/// Returns an empty reel for an empty pool.
pub fn generate_reel<R: Rng + ?Sized>(
    pool: &UnboxingCase,
    length: usize,
    rng: &mut R,
) -> Vec<CaseItem> {
    let tiers = Tiers::new(pool);
    (0..length)
        .filter_map(|_| tiers.sample(rng).cloned())
        .collect()
}

/// An opening in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct Reveal {
    pub case_id: String,
    /// Price paid; becomes the purchase price of the won item.
    pub cost: f64,
    pub reel: Vec<CaseItem>,
    pub winner: CaseItem,
    pub started_at: i64,
    pub ends_at: i64,
}

/// Unboxing state machine: `Idle -> Revealing -> Idle`.
#[derive(Clone, Debug)]
pub struct UnboxingEngine {
    reveal_ms: i64,
    current: Option<Reveal>,
}

impl Default for UnboxingEngine {
    fn default() -> Self {
        Self::new(REVEAL_DURATION_MS)
    }
}

impl UnboxingEngine {
    pub fn new(reveal_ms: i64) -> Self {
        Self {
            reveal_ms: reveal_ms.max(0),
            current: None,
        }
    }

    pub fn is_revealing(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&Reveal> {
        self.current.as_ref()
    }

    /// Start opening `case`. No-op while another reveal runs or when the
    /// balance does not cover the cost.
    pub fn open<R: Rng + ?Sized>(
        &mut self,
        state: &mut GameState,
        case: &UnboxingCase,
        now: i64,
        rng: &mut R,
    ) -> Option<&Reveal> {
        if self.current.is_some() {
            debug!(case_id = %case.id, "opening already in progress");
            return None;
        }
        if state.balance < case.cost {
            debug!(case_id = %case.id, cost = case.cost, "case unaffordable");
            return None;
        }
        let reel = generate_reel(case, REEL_LENGTH, rng);
        let winner = reel.get(WINNING_INDEX)?.clone();
        if !state.try_debit(case.cost) {
            return None;
        }
        info!(case_id = %case.id, winner = %winner.id, "reveal started");
        self.current = Some(Reveal {
            case_id: case.id.clone(),
            cost: case.cost,
            reel,
            winner,
            started_at: now,
            ends_at: now.saturating_add(self.reveal_ms),
        });
        self.current.as_ref()
    }

    /// Finish the reveal once its window has elapsed, crediting the
    /// inventory. Returns the new entry.
    pub fn poll<R: Rng + ?Sized>(
        &mut self,
        state: &mut GameState,
        now: i64,
        rng: &mut R,
    ) -> Option<InventoryItem> {
        match &self.current {
            Some(r) if now >= r.ends_at => self.finish_now(state, now, rng),
            _ => None,
        }
    }

    /// Settle a pending reveal immediately, e.g. before session teardown.
    pub fn finish_now<R: Rng + ?Sized>(
        &mut self,
        state: &mut GameState,
        now: i64,
        rng: &mut R,
    ) -> Option<InventoryItem> {
        let reveal = self.current.take()?;
        let entry = InventoryItem {
            id: unique_entry_id(state, now, rng),
            item: reveal.winner,
            purchase_price: reveal.cost,
            unboxed_at: now,
        };
        state.inventory.insert(0, entry.clone());
        info!(item = %entry.item.id, "reveal finished");
        Some(entry)
    }
}

fn unique_entry_id<R: Rng + ?Sized>(state: &GameState, now: i64, rng: &mut R) -> String {
    loop {
        let id = format!("{}{}", random_token(rng, 9), now);
        if state.inventory.iter().all(|e| e.id != id) {
            return id;
        }
    }
}
