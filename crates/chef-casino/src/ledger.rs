//! Inventory valuation, sales and cooking.
//!
//! Sales and cook payouts credit the balance only; they are not earnings.

use chef_core::{GameState, InventoryItem};
use tracing::debug;

/// Items consumed by one cook.
pub const COOK_BATCH: usize = 3;
/// Premium applied to a cook payout.
pub const COOK_BONUS: f64 = 2.5;

/// Sale value of an entry: `floor(purchase_price * multiplier)`.
pub fn valuation_of(entry: &InventoryItem) -> f64 {
    (entry.purchase_price * entry.item.multiplier).floor()
}

/// Sum of all sale values.
pub fn total_value(state: &GameState) -> f64 {
    state.inventory.iter().map(valuation_of).sum()
}

/// Sell one entry by id. Returns the amount credited.
pub fn sell(state: &mut GameState, id: &str) -> Option<f64> {
    let Some(pos) = state.inventory.iter().position(|e| e.id == id) else {
        debug!(id, "no such inventory entry");
        return None;
    };
    let entry = state.inventory.remove(pos);
    let value = valuation_of(&entry);
    state.credit(value);
    Some(value)
}

/// Sell everything. Returns the amount credited, `None` when empty.
pub fn sell_all(state: &mut GameState) -> Option<f64> {
    if state.inventory.is_empty() {
        return None;
    }
    let value = total_value(state);
    state.inventory.clear();
    state.credit(value);
    Some(value)
}

/// Payout for cooking the given entries.
pub fn cook_payout(batch: &[InventoryItem]) -> f64 {
    if batch.is_empty() {
        return 0.0;
    }
    let total_cost: f64 = batch.iter().map(|e| e.purchase_price).sum();
    let avg_multiplier =
        batch.iter().map(|e| e.item.multiplier).sum::<f64>() / batch.len() as f64;
    (total_cost * avg_multiplier * COOK_BONUS).floor()
}

/// Cook the three most recent entries into a lump sum.
pub fn cook(state: &mut GameState) -> Option<f64> {
    if state.inventory.len() < COOK_BATCH {
        debug!(have = state.inventory.len(), "not enough items to cook");
        return None;
    }
    let batch: Vec<InventoryItem> = state.inventory.drain(..COOK_BATCH).collect();
    let payout = cook_payout(&batch);
    state.credit(payout);
    Some(payout)
}
