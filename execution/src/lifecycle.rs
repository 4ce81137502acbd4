//! Round lifecycle rules.
//!
//! This module holds the deterministic part of a round's state machine: which
//! transitions are legal, when betting is open, how the deadline is computed,
//! and how often the bonus vault probe may fire. It performs no I/O and holds
//! no state, so the async round driver and the tests share the same rules.
//!
//! ## Phases
//!
//! 1. **Pending** - Round constructed, no timer yet
//! 2. **Betting** - Window open, deadline armed, bonus probe running
//! 3. **Finished** - Resolution computed, side effects applied (terminal)
//!
//! The status, not the wall clock, decides whether a bet is accepted: the
//! scheduler closes the window by finishing the round.

use timevault_types::constants::BONUS_PROBE_SPREAD;
use timevault_types::{RoundConfig, RoundStatus};

/// Result of asking for a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    /// The requested transition is not legal from the current status.
    Rejected { from: RoundStatus },
    /// Transition to the given status.
    TransitionTo { status: RoundStatus },
}

/// Opening the window is only legal from `Pending`.
pub fn start_betting(status: RoundStatus) -> TransitionResult {
    match status {
        RoundStatus::Pending => TransitionResult::TransitionTo {
            status: RoundStatus::Betting,
        },
        from => TransitionResult::Rejected { from },
    }
}

/// Finishing is legal from any non-terminal status. A round that never opened
/// betting still resolves (with no bets).
pub fn finish(status: RoundStatus) -> TransitionResult {
    match status {
        RoundStatus::Finished => TransitionResult::Rejected {
            from: RoundStatus::Finished,
        },
        _ => TransitionResult::TransitionTo {
            status: RoundStatus::Finished,
        },
    }
}

/// Check if a bet may be appended.
pub fn is_betting_open(status: RoundStatus) -> bool {
    matches!(status, RoundStatus::Betting)
}

/// Absolute deadline of the betting window, saturating on overflow.
pub fn betting_deadline_ms(start_ms: u64, config: &RoundConfig) -> u64 {
    start_ms.saturating_add(config.betting_window_ms)
}

/// Per-tick probability used by the bonus vault probe.
///
/// The configured chance is spread over roughly ten ticks so the window-level
/// probability stays near the configured value instead of compounding.
pub fn probe_tick_chance(config: &RoundConfig) -> f64 {
    config.bonus_vault_chance / BONUS_PROBE_SPREAD
}

/// Whether the probe should keep polling.
///
/// Generic over the clock type so the async driver can pass monotonic
/// instants while tests use plain milliseconds.
pub fn probe_should_continue<T: PartialOrd>(
    status: RoundStatus,
    awarded: bool,
    now: T,
    deadline: T,
) -> bool {
    is_betting_open(status) && !awarded && now < deadline
}
