use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::config::RoundConfig;

/// Unique identifier of a round (`round_` followed by 8 hex characters).
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUp {
    MultiplierBoost,
}

impl PowerUp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUp::MultiplierBoost => "multiplier_boost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "multiplier_boost" => Some(PowerUp::MultiplierBoost),
            _ => None,
        }
    }
}

/// A single wager. Immutable once accepted by a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub player_id: String,
    pub second: u32,
    pub amount: f64,
    #[serde(default)]
    pub power_up: Option<PowerUp>,
}

impl Bet {
    pub fn new(
        player_id: impl Into<String>,
        second: u32,
        amount: f64,
        power_up: Option<PowerUp>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            second,
            amount,
            power_up,
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum BetInputError {
    #[error("second must be a non-negative integer (got {0})")]
    InvalidSecond(String),
    #[error("amount must be a positive finite number (got {0})")]
    InvalidAmount(f64),
    #[error("player id must not be empty")]
    EmptyPlayer,
    #[error("unsupported power-up: {0}")]
    UnknownPowerUp(String),
}

/// Boundary validation for raw bet input. Rounds never see malformed bets.
pub fn validate_bet_input(
    player_id: &str,
    second: &serde_json::Number,
    amount: f64,
    power_up: Option<&str>,
) -> Result<Bet, BetInputError> {
    if player_id.is_empty() {
        return Err(BetInputError::EmptyPlayer);
    }
    let second = second
        .as_u64()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| BetInputError::InvalidSecond(second.to_string()))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BetInputError::InvalidAmount(amount));
    }
    let power_up = match power_up {
        None => None,
        Some(raw) => Some(
            PowerUp::parse(raw).ok_or_else(|| BetInputError::UnknownPowerUp(raw.to_string()))?,
        ),
    };
    Ok(Bet::new(player_id, second, amount, power_up))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Pending,
    Betting,
    Finished,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Betting => "betting",
            RoundStatus::Finished => "finished",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub player_id: String,
    /// Stake of the winning bet.
    pub amount: f64,
    pub payout: f64,
    /// Effective multiplier on the stake.
    pub multiplier: f64,
}

/// Fairness tokens attached to every resolution. Opaque to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessData {
    pub server_seed: String,
    pub client_seed: String,
    pub final_hash: String,
}

/// Outcome of a round, produced once by the payout engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub unlock_second: u32,
    pub total_pot: f64,
    pub winners: Vec<WinnerRecord>,
    pub payouts: BTreeMap<String, f64>,
    pub provably_fair_data: FairnessData,
    pub special_event_triggered: Option<String>,
}

impl Resolution {
    pub fn total_payout(&self) -> f64 {
        self.payouts.values().sum()
    }
}

/// Stable shape of a finished round, used for history and the audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: RoundId,
    pub config: RoundConfig,
    pub bets: Vec<Bet>,
    pub result: Option<Resolution>,
}

/// Read-only projection of a round for broadcasting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: RoundId,
    pub status: RoundStatus,
    /// Unix epoch milliseconds at which betting closes; absent while pending.
    pub bet_end_time: Option<u64>,
    pub bets_placed: usize,
    pub result: Option<Resolution>,
    pub active_events: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub wins: u64,
    pub total_bet: f64,
    pub total_won: f64,
}
