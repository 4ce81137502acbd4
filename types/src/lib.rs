//! Common types shared by the Time Vault crates.

pub mod api;
pub mod config;
pub mod constants;
pub mod round;

pub use config::{ActiveEvent, ConfigError, EventEffects, RoundConfig};
pub use round::{
    validate_bet_input, Bet, BetInputError, FairnessData, PlayerStats, PowerUp, Resolution,
    RoundId, RoundRecord, RoundSnapshot, RoundStatus, WinnerRecord,
};
