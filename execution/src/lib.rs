//! Time Vault execution layer.
//!
//! This crate contains the pure logic of a round: the lifecycle rules
//! ([`lifecycle`]), the payout engine ([`payout`]) and fairness token
//! generation ([`fairness`]).
//!
//! ## Determinism requirements
//! - Do not read the wall clock here; callers pass timestamps in.
//! - Only draw randomness from the RNG handed in by the caller.
//! - Avoid iteration order of hash-based collections influencing outputs.
//!
//! ## Resolving a round (example)
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use timevault_execution::payout::simulate;
//! use timevault_types::{Bet, RoundConfig, RoundId};
//!
//! let bets = vec![Bet::new("alice", 42, 10.0, None)];
//! let mut rng = StdRng::seed_from_u64(7);
//! let round_id = RoundId::new("round_00000001");
//! let resolution = simulate(&round_id, &bets, &RoundConfig::default(), &mut rng);
//! assert!(resolution.total_payout() <= 10.0 * 150.0 * 1.5);
//! ```

pub mod fairness;
pub mod lifecycle;
pub mod payout;

pub use fairness::{compute_final_hash, generate_fairness};
pub use lifecycle::TransitionResult;
pub use payout::{draw_outcome, settle, simulate, Outcome};
