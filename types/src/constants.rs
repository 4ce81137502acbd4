/// Maximum number of finished rounds kept in session history
pub const ROUND_HISTORY_LIMIT: usize = 50;

/// Number of leaderboard entries broadcast after each round
pub const LEADERBOARD_BROADCAST_SIZE: usize = 10;

/// Instant-win multiplier applied to the bet picked by the bonus vault
pub const BONUS_VAULT_MULTIPLIER: f64 = 10.0;

/// Interval between bonus vault probe ticks
pub const BONUS_PROBE_INTERVAL_MS: u64 = 500;

/// The configured bonus vault chance is spread across this many probe ticks.
pub const BONUS_PROBE_SPREAD: f64 = 10.0;

/// Quick Burst unlock range (inclusive)
pub const QUICK_BURST_MIN_SECOND: u32 = 1;
pub const QUICK_BURST_MAX_SECOND: u32 = 8;

/// Quick Burst flat multiplier range (inclusive)
pub const QUICK_BURST_MULTIPLIER_MIN: f64 = 50.0;
pub const QUICK_BURST_MULTIPLIER_MAX: f64 = 150.0;

/// Label attached to a resolution when Quick Burst fires
pub const QUICK_BURST_LABEL: &str = "Quick Burst";

/// Personal multiplier for bets carrying the `multiplier_boost` power-up
pub const POWER_UP_MULTIPLIER: f64 = 1.5;

/// Default round parameters.
pub const DEFAULT_MIN_SECONDS: u32 = 10;
pub const DEFAULT_MAX_SECONDS: u32 = 180;
pub const DEFAULT_BETTING_WINDOW_MS: u64 = 5_000;
pub const DEFAULT_QUICK_BURST_CHANCE: f64 = 0.05;
pub const DEFAULT_BONUS_VAULT_CHANCE: f64 = 0.03;
pub const DEFAULT_HOUSE_EDGE: f64 = 0.02;
