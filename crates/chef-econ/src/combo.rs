//! Combo meter and frenzy window.
//!
//! The meter rises on clicks and decays on the fast tick. Frenzy starts the
//! moment the meter reaches 100 and ends the moment it decays back to 0, so a
//! new frenzy always requires a full drain first.

use crate::EconError;
use serde::{Deserialize, Serialize};

/// Upper bound of the combo meter.
pub const COMBO_MAX: f64 = 100.0;
/// Click multiplier while frenzy is active.
pub const FRENZY_MULTIPLIER: f64 = 5.0;

/// Decay per tick for each idle tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayTiers {
    /// Clicked within the short idle threshold.
    pub active: f64,
    /// Idle longer than the short threshold.
    pub short_idle: f64,
    /// Idle longer than the long threshold.
    pub long_idle: f64,
}

/// Tunable combo policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    pub base_gain: f64,
    pub frenzy_gain: f64,
    pub short_idle_ms: i64,
    pub long_idle_ms: i64,
    pub normal_decay: DecayTiers,
    pub frenzy_decay: DecayTiers,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            base_gain: 5.8,
            frenzy_gain: 2.5,
            short_idle_ms: 600,
            long_idle_ms: 1200,
            normal_decay: DecayTiers {
                active: 0.8,
                short_idle: 2.0,
                long_idle: 4.0,
            },
            frenzy_decay: DecayTiers {
                active: 0.4,
                short_idle: 1.2,
                long_idle: 2.5,
            },
        }
    }
}

impl ComboConfig {
    /// Reject policies where a longer idle would decay slower.
    pub fn validate(&self) -> Result<(), EconError> {
        let gains_ok = self.base_gain.is_finite()
            && self.frenzy_gain.is_finite()
            && self.base_gain > 0.0
            && self.frenzy_gain > 0.0;
        if !gains_ok {
            return Err(EconError::InvalidCombo("gains must be positive".into()));
        }
        if self.short_idle_ms < 0 || self.long_idle_ms < self.short_idle_ms {
            return Err(EconError::InvalidCombo(
                "idle thresholds must satisfy 0 <= short <= long".into(),
            ));
        }
        for (name, t) in [("normal", self.normal_decay), ("frenzy", self.frenzy_decay)] {
            let finite = t.active.is_finite() && t.short_idle.is_finite() && t.long_idle.is_finite();
            if !finite || t.active < 0.0 || t.short_idle < t.active || t.long_idle < t.short_idle {
                return Err(EconError::InvalidCombo(format!(
                    "{name} decay tiers are not monotonic"
                )));
            }
        }
        Ok(())
    }
}

/// Frenzy state change caused by a click or a decay step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrenzyTransition {
    Started,
    Ended,
}

/// Combo meter state.
#[derive(Clone, Debug)]
pub struct ComboFrenzy {
    cfg: ComboConfig,
    combo: f64,
    is_frenzy: bool,
    last_click_time: i64,
}

impl ComboFrenzy {
    pub fn new(cfg: ComboConfig) -> Self {
        Self {
            cfg,
            combo: 0.0,
            is_frenzy: false,
            last_click_time: 0,
        }
    }

    pub fn combo(&self) -> f64 {
        self.combo
    }

    pub fn is_frenzy(&self) -> bool {
        self.is_frenzy
    }

    pub fn last_click_time(&self) -> i64 {
        self.last_click_time
    }

    /// Click multiplier contributed by frenzy.
    pub fn multiplier(&self) -> f64 {
        if self.is_frenzy {
            FRENZY_MULTIPLIER
        } else {
            1.0
        }
    }

    /// Register a click at `now`.
    pub fn register_click(&mut self, now: i64) -> Option<FrenzyTransition> {
        let gain = if self.is_frenzy {
            self.cfg.frenzy_gain
        } else {
            self.cfg.base_gain
        };
        self.combo = (self.combo + gain).min(COMBO_MAX);
        self.last_click_time = now;
        if self.combo >= COMBO_MAX && !self.is_frenzy {
            self.is_frenzy = true;
            return Some(FrenzyTransition::Started);
        }
        None
    }

    /// Decay for one tick given the time since the last click.
    pub fn decay_amount(&self, now: i64) -> f64 {
        let idle = now.saturating_sub(self.last_click_time);
        let tiers = if self.is_frenzy {
            self.cfg.frenzy_decay
        } else {
            self.cfg.normal_decay
        };
        if idle > self.cfg.long_idle_ms {
            tiers.long_idle
        } else if idle > self.cfg.short_idle_ms {
            tiers.short_idle
        } else {
            tiers.active
        }
    }

    /// Apply one tick of decay.
    pub fn decay(&mut self, now: i64) -> Option<FrenzyTransition> {
        if self.combo <= 0.0 {
            return None;
        }
        self.combo = (self.combo - self.decay_amount(now)).max(0.0);
        if self.combo == 0.0 && self.is_frenzy {
            self.is_frenzy = false;
            return Some(FrenzyTransition::Ended);
        }
        None
    }
}

impl Default for ComboFrenzy {
    fn default() -> Self {
        Self::new(ComboConfig::default())
    }
}
