//! Service configuration read from `VAULT_TABLE_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use timevault_types::constants::{
    DEFAULT_BETTING_WINDOW_MS, DEFAULT_BONUS_VAULT_CHANCE, DEFAULT_HOUSE_EDGE, DEFAULT_MAX_SECONDS,
    DEFAULT_MIN_SECONDS, DEFAULT_QUICK_BURST_CHANCE,
};
use timevault_types::RoundConfig;

#[derive(Clone, Debug)]
pub struct VaultTableConfig {
    pub host: String,
    pub port: u16,
    pub seed: Option<u64>,
    pub round: RoundConfig,
    pub cooldown: Duration,
    pub events_path: PathBuf,
    pub audit_path: Option<PathBuf>,
    pub audit_buffer: usize,
}

impl VaultTableConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests need not touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());
        Self {
            host: read("VAULT_TABLE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&read, "VAULT_TABLE_PORT", 9124),
            seed: read("VAULT_TABLE_SEED").and_then(|raw| raw.parse().ok()),
            round: RoundConfig {
                min_seconds: parse_or(&read, "VAULT_TABLE_MIN_SECONDS", DEFAULT_MIN_SECONDS),
                max_seconds: parse_or(&read, "VAULT_TABLE_MAX_SECONDS", DEFAULT_MAX_SECONDS),
                betting_window_ms: parse_or(
                    &read,
                    "VAULT_TABLE_BETTING_MS",
                    DEFAULT_BETTING_WINDOW_MS,
                ),
                quick_burst_chance: parse_or(
                    &read,
                    "VAULT_TABLE_QUICK_BURST_CHANCE",
                    DEFAULT_QUICK_BURST_CHANCE,
                ),
                bonus_vault_chance: parse_or(
                    &read,
                    "VAULT_TABLE_BONUS_VAULT_CHANCE",
                    DEFAULT_BONUS_VAULT_CHANCE,
                ),
                house_edge: parse_or(&read, "VAULT_TABLE_HOUSE_EDGE", DEFAULT_HOUSE_EDGE),
                multiplier_boost: parse_or(&read, "VAULT_TABLE_MULTIPLIER_BOOST", 1.0),
            },
            cooldown: Duration::from_millis(parse_or(&read, "VAULT_TABLE_COOLDOWN_MS", 0)),
            events_path: read("VAULT_TABLE_EVENTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/events.yaml")),
            audit_path: read("VAULT_TABLE_AUDIT_PATH").map(PathBuf::from),
            audit_buffer: parse_or(&read, "VAULT_TABLE_AUDIT_BUFFER", 256),
        }
    }
}

fn parse_or<T: FromStr>(read: &impl Fn(&str) -> Option<String>, key: &str, fallback: T) -> T {
    read(key)
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(fallback)
}
