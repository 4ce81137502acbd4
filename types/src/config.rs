use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::constants::{
    DEFAULT_BETTING_WINDOW_MS, DEFAULT_BONUS_VAULT_CHANCE, DEFAULT_HOUSE_EDGE, DEFAULT_MAX_SECONDS,
    DEFAULT_MIN_SECONDS, DEFAULT_QUICK_BURST_CHANCE,
};

#[derive(Debug, ThisError, PartialEq)]
pub enum ConfigError {
    #[error("min_seconds must be <= max_seconds (min={min}, max={max})")]
    InvertedRange { min: u32, max: u32 },
    #[error("{field} must be within [0, 1] (got {value})")]
    ChanceOutOfRange { field: &'static str, value: f64 },
    #[error("house_edge must be within [0, 1) (got {value})")]
    HouseEdgeOutOfRange { value: f64 },
    #[error("multiplier_boost must be > 0 (got {value})")]
    InvalidMultiplierBoost { value: f64 },
    #[error("betting_window_ms must be greater than zero")]
    EmptyBettingWindow,
}

/// Parameters of a single round.
///
/// A round snapshots its effective configuration at creation: the base
/// configuration with every active event's [`EventEffects`] folded in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Lowest unlockable second in a standard round.
    pub min_seconds: u32,
    /// Highest unlockable second in a standard round.
    pub max_seconds: u32,
    /// Length of the betting window.
    pub betting_window_ms: u64,
    /// Probability that a round resolves as a Quick Burst.
    pub quick_burst_chance: f64,
    /// Probability (spread across the window) that the bonus vault fires.
    pub bonus_vault_chance: f64,
    /// Share of the pot retained by the house in standard rounds.
    pub house_edge: f64,
    /// Global payout multiplier, usually raised by events.
    pub multiplier_boost: f64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            min_seconds: DEFAULT_MIN_SECONDS,
            max_seconds: DEFAULT_MAX_SECONDS,
            betting_window_ms: DEFAULT_BETTING_WINDOW_MS,
            quick_burst_chance: DEFAULT_QUICK_BURST_CHANCE,
            bonus_vault_chance: DEFAULT_BONUS_VAULT_CHANCE,
            house_edge: DEFAULT_HOUSE_EDGE,
            multiplier_boost: 1.0,
        }
    }
}

impl RoundConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_seconds > self.max_seconds {
            return Err(ConfigError::InvertedRange {
                min: self.min_seconds,
                max: self.max_seconds,
            });
        }
        if self.betting_window_ms == 0 {
            return Err(ConfigError::EmptyBettingWindow);
        }
        for (field, value) in [
            ("quick_burst_chance", self.quick_burst_chance),
            ("bonus_vault_chance", self.bonus_vault_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ChanceOutOfRange { field, value });
            }
        }
        if !(0.0..1.0).contains(&self.house_edge) {
            return Err(ConfigError::HouseEdgeOutOfRange {
                value: self.house_edge,
            });
        }
        if !(self.multiplier_boost.is_finite() && self.multiplier_boost > 0.0) {
            return Err(ConfigError::InvalidMultiplierBoost {
                value: self.multiplier_boost,
            });
        }
        Ok(())
    }

    /// Fold event overlays into this configuration. Later overlays win on
    /// conflicting keys.
    pub fn with_effects<'a>(&self, effects: impl IntoIterator<Item = &'a EventEffects>) -> Self {
        let mut merged = self.clone();
        for effect in effects {
            effect.apply(&mut merged);
        }
        merged
    }
}

/// Partial override of a [`RoundConfig`] contributed by a global event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventEffects {
    #[serde(alias = "minSeconds", skip_serializing_if = "Option::is_none")]
    pub min_seconds: Option<u32>,
    #[serde(alias = "maxSeconds", skip_serializing_if = "Option::is_none")]
    pub max_seconds: Option<u32>,
    #[serde(alias = "bettingWindowMs", skip_serializing_if = "Option::is_none")]
    pub betting_window_ms: Option<u64>,
    #[serde(alias = "quickBurstChance", skip_serializing_if = "Option::is_none")]
    pub quick_burst_chance: Option<f64>,
    #[serde(alias = "bonusVaultChance", skip_serializing_if = "Option::is_none")]
    pub bonus_vault_chance: Option<f64>,
    #[serde(alias = "houseEdge", skip_serializing_if = "Option::is_none")]
    pub house_edge: Option<f64>,
    #[serde(alias = "multiplierBoost", skip_serializing_if = "Option::is_none")]
    pub multiplier_boost: Option<f64>,
}

impl EventEffects {
    fn apply(&self, config: &mut RoundConfig) {
        if let Some(value) = self.min_seconds {
            config.min_seconds = value;
        }
        if let Some(value) = self.max_seconds {
            config.max_seconds = value;
        }
        if let Some(value) = self.betting_window_ms {
            config.betting_window_ms = value;
        }
        if let Some(value) = self.quick_burst_chance {
            config.quick_burst_chance = value;
        }
        if let Some(value) = self.bonus_vault_chance {
            config.bonus_vault_chance = value;
        }
        if let Some(value) = self.house_edge {
            config.house_edge = value;
        }
        if let Some(value) = self.multiplier_boost {
            config.multiplier_boost = value;
        }
    }
}

/// An active global event: its display name plus the overlay it applies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveEvent {
    pub name: String,
    #[serde(default)]
    pub effects: EventEffects,
}
