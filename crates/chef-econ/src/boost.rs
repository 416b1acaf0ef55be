//! Externally granted, time-boxed multiplier.
//!
//! Expiry is implicit: a boost is a read-time comparison against wall-clock
//! time and is never decremented.

use chef_core::{Boost, GameState};

/// Multiplier applied while a boost is active.
pub const BOOST_MULTIPLIER: f64 = 2.0;
/// Boost granted by the reward collaborator (five minutes).
pub const AD_BOOST_DURATION_MS: i64 = 5 * 60 * 1000;

/// Start a boost ending `duration_ms` from `now`, replacing any current one.
pub fn grant_boost(state: &mut GameState, duration_ms: i64, now: i64) {
    state.active_boost = Some(Boost {
        multiplier: BOOST_MULTIPLIER,
        end_time: now.saturating_add(duration_ms.max(0)),
    });
}

pub fn is_active(state: &GameState, now: i64) -> bool {
    matches!(state.active_boost, Some(b) if b.end_time > now)
}

/// Factor to apply to income and clicks at `now`. The stored multiplier is
/// informational; an active boost always doubles.
pub fn multiplier(state: &GameState, now: i64) -> f64 {
    if is_active(state, now) {
        BOOST_MULTIPLIER
    } else {
        1.0
    }
}

/// Milliseconds left on the active boost, 0 when none.
pub fn remaining_ms(state: &GameState, now: i64) -> i64 {
    state
        .active_boost
        .map(|b| (b.end_time - now).max(0))
        .unwrap_or(0)
}
