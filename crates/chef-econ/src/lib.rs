#![deny(warnings)]

//! Economy rules for Chef Tycoon: clicks, passive income, upgrade pricing,
//! skins and the daily reward.
//!
//! Every operation mutates a [`GameState`] in place. Rejected intents
//! (unknown id, insufficient balance, already owned, cooldown) are silent
//! no-ops that report `false` and leave the state untouched.

pub mod boost;
pub mod combo;

use chef_core::{Catalog, GameState, UPGRADE_COST_GROWTH};
use combo::{ComboFrenzy, FrenzyTransition};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Probability that a click is a critical hit.
pub const CRIT_CHANCE: f64 = 0.05;
/// Click multiplier on a critical hit.
pub const CRIT_MULTIPLIER: f64 = 10.0;
/// Fast tick period in the reference cadence.
pub const TICK_MS: i64 = 100;
/// Minimum time between two daily claims.
pub const DAILY_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;
/// A claim later than this after the previous one restarts the streak.
pub const DAILY_STREAK_WINDOW_MS: i64 = 2 * DAILY_COOLDOWN_MS;
/// Flat part of the daily reward.
pub const DAILY_BASE_REWARD: f64 = 1000.0;
/// Seconds of passive income added to the daily reward.
pub const DAILY_INCOME_SECS: f64 = 600.0;

/// Errors produced by economy configuration.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Combo policy violates its bounds or monotonicity.
    #[error("invalid combo config: {0}")]
    InvalidCombo(String),
}

/// Presentation event for a resolved click.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickPop {
    pub value: f64,
    pub is_crit: bool,
    pub x: f32,
    pub y: f32,
}

/// Result of one click: the pop to display and any frenzy change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClickOutcome {
    pub pop: ClickPop,
    pub frenzy: Option<FrenzyTransition>,
}

/// Advance passive income by a fraction of a second.
///
/// Returns the amount credited.
pub fn tick(state: &mut GameState, delta_fraction: f64, now: i64) -> f64 {
    if !delta_fraction.is_finite() || delta_fraction <= 0.0 {
        return 0.0;
    }
    let income = state.passive_income * boost::multiplier(state, now) * delta_fraction;
    state.earn(income);
    income
}

/// Resolve a manual click at screen position `(x, y)`.
///
/// Power is click power times the frenzy, crit and boost factors in effect
/// before this click feeds the combo meter.
pub fn resolve_click<R: Rng + ?Sized>(
    state: &mut GameState,
    combo: &mut ComboFrenzy,
    x: f32,
    y: f32,
    now: i64,
    rng: &mut R,
) -> ClickOutcome {
    let is_crit = rng.gen_bool(CRIT_CHANCE);
    let crit = if is_crit { CRIT_MULTIPLIER } else { 1.0 };
    let value = state.click_power * combo.multiplier() * crit * boost::multiplier(state, now);
    state.earn(value);
    let frenzy = combo.register_click(now);
    ClickOutcome {
        pop: ClickPop {
            value,
            is_crit,
            x,
            y,
        },
        frenzy,
    }
}

/// Price of the next level: `floor(base_cost * 1.5^level)`.
pub fn price_of(state: &GameState, catalog: &Catalog, upgrade_id: &str) -> Option<f64> {
    let upgrade = catalog.upgrade(upgrade_id)?;
    let level = state.level_of(upgrade_id);
    let exp = i32::try_from(level).unwrap_or(i32::MAX);
    Some((upgrade.base_cost * UPGRADE_COST_GROWTH.powi(exp)).floor())
}

/// Buy one level of an upgrade and re-derive the economy.
pub fn purchase_upgrade(state: &mut GameState, catalog: &Catalog, upgrade_id: &str) -> bool {
    let Some(price) = price_of(state, catalog, upgrade_id) else {
        debug!(upgrade_id, "unknown upgrade");
        return false;
    };
    if !state.try_debit(price) {
        debug!(upgrade_id, price, balance = state.balance, "upgrade unaffordable");
        return false;
    }
    *state.upgrades.entry(upgrade_id.to_string()).or_insert(0) += 1;
    state.apply_derived(catalog);
    true
}

/// Buy a skin and equip it.
pub fn purchase_skin(state: &mut GameState, catalog: &Catalog, skin_id: &str) -> bool {
    let Some(skin) = catalog.skin(skin_id) else {
        debug!(skin_id, "unknown skin");
        return false;
    };
    if state.owned_skins.contains(skin_id) {
        debug!(skin_id, "skin already owned");
        return false;
    }
    if !state.try_debit(skin.cost) {
        debug!(skin_id, cost = skin.cost, "skin unaffordable");
        return false;
    }
    state.owned_skins.insert(skin_id.to_string());
    state.active_skin = skin_id.to_string();
    true
}

/// Equip an owned skin. Free and idempotent.
pub fn equip_skin(state: &mut GameState, skin_id: &str) -> bool {
    if !state.owned_skins.contains(skin_id) {
        debug!(skin_id, "cannot equip unowned skin");
        return false;
    }
    state.active_skin = skin_id.to_string();
    true
}

/// Apply a wager result or reward. Balance never goes below zero and
/// losses do not reduce lifetime earnings.
pub fn adjust_balance(state: &mut GameState, amount: f64) {
    if !amount.is_finite() {
        return;
    }
    if amount > 0.0 {
        state.earn(amount);
    } else {
        state.balance = (state.balance + amount).max(0.0);
    }
}

pub fn can_claim_daily(state: &GameState, now: i64) -> bool {
    state.last_daily_claim == 0 || now - state.last_daily_claim > DAILY_COOLDOWN_MS
}

/// Reward for a daily claim: a flat amount plus ten minutes of income.
pub fn daily_reward(state: &GameState) -> f64 {
    DAILY_BASE_REWARD + state.passive_income * DAILY_INCOME_SECS
}

/// Claim the daily reward. Returns the amount credited.
pub fn claim_daily(state: &mut GameState, now: i64) -> Option<f64> {
    if !can_claim_daily(state, now) {
        debug!(last = state.last_daily_claim, "daily reward on cooldown");
        return None;
    }
    let reward = daily_reward(state);
    let continues = state.last_daily_claim != 0
        && now - state.last_daily_claim <= DAILY_STREAK_WINDOW_MS;
    state.daily_streak = if continues {
        state.daily_streak.saturating_add(1)
    } else {
        1
    };
    state.earn(reward);
    state.last_daily_claim = now;
    Some(reward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chef_core::{derive_economy, DEFAULT_SKIN};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    fn rich() -> GameState {
        GameState {
            balance: 1e12,
            ..GameState::default()
        }
    }

    #[test]
    fn price_follows_geometric_curve() {
        let cat = catalog();
        let mut s = rich();
        assert_eq!(price_of(&s, &cat, "intern_chef"), Some(15.0));
        assert!(purchase_upgrade(&mut s, &cat, "intern_chef"));
        assert_eq!(price_of(&s, &cat, "intern_chef"), Some(22.0));
        assert!(purchase_upgrade(&mut s, &cat, "intern_chef"));
        assert_eq!(price_of(&s, &cat, "intern_chef"), Some(33.0));
        assert_eq!(price_of(&s, &cat, "nope"), None);
    }

    #[test]
    fn purchase_rederives_income_and_click_power() {
        let cat = catalog();
        let mut s = rich();
        for _ in 0..3 {
            assert!(purchase_upgrade(&mut s, &cat, "sous_chef"));
        }
        assert!(purchase_upgrade(&mut s, &cat, "fancy_stove"));
        assert_eq!(s.passive_income, 3.0 * 8.0 + 45.0);
        assert_eq!(s.click_power, 1.0 + (69.0f64 * 0.1).floor());
        assert_eq!(s.level_of("sous_chef"), 3);
    }

    #[test]
    fn rejected_purchase_leaves_state_unchanged() {
        let cat = catalog();
        let mut s = GameState {
            balance: 14.0,
            ..GameState::default()
        };
        let before = s.clone();
        assert!(!purchase_upgrade(&mut s, &cat, "intern_chef"));
        assert!(!purchase_upgrade(&mut s, &cat, "warp_drive"));
        assert_eq!(s, before);
    }

    #[test]
    fn skin_purchase_equip_rules() {
        let cat = catalog();
        let mut s = GameState {
            balance: 600.0,
            ..GameState::default()
        };
        assert!(!equip_skin(&mut s, "line_cook"));
        assert!(purchase_skin(&mut s, &cat, "line_cook"));
        assert_eq!(s.balance, 100.0);
        assert_eq!(s.active_skin, "line_cook");
        assert!(!purchase_skin(&mut s, &cat, "line_cook"));
        assert!(!purchase_skin(&mut s, &cat, "ninja_chef"));
        assert!(equip_skin(&mut s, DEFAULT_SKIN));
        assert!(equip_skin(&mut s, DEFAULT_SKIN));
        assert_eq!(s.active_skin, DEFAULT_SKIN);
        assert_eq!(s.balance, 100.0);
    }

    #[test]
    fn adjust_balance_clamps_and_keeps_lifetime() {
        let mut s = GameState::default();
        adjust_balance(&mut s, 100.0);
        adjust_balance(&mut s, -250.0);
        assert_eq!(s.balance, 0.0);
        assert_eq!(s.total_earned, 100.0);
    }

    #[test]
    fn tick_accrues_with_boost() {
        let mut s = GameState {
            passive_income: 10.0,
            ..GameState::default()
        };
        assert_eq!(tick(&mut s, 0.1, 0), 1.0);
        boost::grant_boost(&mut s, 1_000, 0);
        assert_eq!(tick(&mut s, 0.1, 500), 2.0);
        assert_eq!(tick(&mut s, 0.1, 1_000), 1.0);
        assert_eq!(s.balance, 4.0);
        assert_eq!(s.total_earned, 4.0);
    }

    #[test]
    fn click_multipliers_stack() {
        let mut s = GameState {
            click_power: 3.0,
            ..GameState::default()
        };
        let mut combo = ComboFrenzy::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut crits = 0;
        let mut frenzy_seen = false;
        boost::grant_boost(&mut s, 1_000_000, 0);
        for i in 0..200 {
            let in_frenzy = combo.is_frenzy();
            let out = resolve_click(&mut s, &mut combo, 1.0, 2.0, i, &mut rng);
            let crit = if out.pop.is_crit { 10.0 } else { 1.0 };
            let frenzy = if in_frenzy { 5.0 } else { 1.0 };
            assert_eq!(out.pop.value, 3.0 * crit * frenzy * 2.0);
            crits += usize::from(out.pop.is_crit);
            frenzy_seen |= out.frenzy == Some(FrenzyTransition::Started);
        }
        assert!(frenzy_seen);
        assert!(crits > 0 && crits < 40);
        assert_eq!(s.balance, s.total_earned);
    }

    #[test]
    fn daily_claim_cooldown_and_streak() {
        let mut s = GameState {
            passive_income: 2.0,
            ..GameState::default()
        };
        let day = DAILY_COOLDOWN_MS;
        assert_eq!(claim_daily(&mut s, 5 * day), Some(2200.0));
        assert_eq!(s.daily_streak, 1);
        assert_eq!(claim_daily(&mut s, 5 * day + day), None);
        assert_eq!(claim_daily(&mut s, 6 * day + 1), Some(2200.0));
        assert_eq!(s.daily_streak, 2);
        assert_eq!(claim_daily(&mut s, 10 * day), Some(2200.0));
        assert_eq!(s.daily_streak, 1);
        assert_eq!(s.total_earned, 6600.0);
    }

    proptest! {
        #[test]
        fn price_strictly_increases_with_level(idx in 0usize..11, n in 0u32..40) {
            let cat = catalog();
            let u = &cat.upgrades[idx];
            let mut s = GameState::default();
            s.upgrades.insert(u.id.clone(), n);
            let p0 = price_of(&s, &cat, &u.id).unwrap();
            prop_assert_eq!(p0, (u.base_cost * 1.5f64.powi(n as i32)).floor());
            s.upgrades.insert(u.id.clone(), n + 1);
            let p1 = price_of(&s, &cat, &u.id).unwrap();
            prop_assert!(p1 > p0);
        }

        #[test]
        fn income_invariant_holds_after_purchases(picks in proptest::collection::vec(0usize..11, 1..60)) {
            let cat = catalog();
            let mut s = rich();
            for i in picks {
                let id = cat.upgrades[i].id.clone();
                purchase_upgrade(&mut s, &cat, &id);
                let d = derive_economy(&s.upgrades, &cat);
                prop_assert_eq!(s.passive_income, d.passive_income);
                prop_assert_eq!(s.click_power, 1.0 + (s.passive_income * 0.1).floor());
                prop_assert!(s.balance >= 0.0);
            }
        }
    }
}
