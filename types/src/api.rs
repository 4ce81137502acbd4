//! Wire messages exchanged with connected players.
//!
//! Inbound requests carry a `requestId` that is echoed back in the matching
//! [`OutboundResponse`]. Everything else the service pushes is a
//! [`Notification`] broadcast to every subscriber.

use serde::{Deserialize, Serialize};

use crate::round::{PlayerStats, Resolution, RoundId, RoundSnapshot};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub winnings: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "game_update")]
    GameUpdate { payload: RoundSnapshot },
    #[serde(rename = "new_bet")]
    NewBet {
        #[serde(rename = "roundId")]
        round_id: RoundId,
        second: u32,
        amount: f64,
    },
    #[serde(rename = "bonus_vault_win")]
    BonusVaultWin {
        #[serde(rename = "roundId")]
        round_id: RoundId,
        #[serde(rename = "playerId")]
        player_id: String,
        payout: f64,
    },
    #[serde(rename = "round_result")]
    RoundResult {
        #[serde(rename = "roundId")]
        round_id: RoundId,
        payload: Resolution,
    },
    #[serde(rename = "leaderboard_update")]
    LeaderboardUpdate { entries: Vec<LeaderboardEntry> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "place_bet")]
    PlaceBet {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerId")]
        player_id: String,
        second: serde_json::Number,
        amount: f64,
        #[serde(rename = "powerUp", default)]
        power_up: Option<String>,
    },
    #[serde(rename = "stats")]
    Stats {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "playerId")]
        player_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutboundResponse {
    #[serde(rename = "ack")]
    Ack {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stats: Option<PlayerStats>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        code: String,
        message: String,
    },
}
