//! Payout engine.
//!
//! Maps a finalized bet list plus round parameters and randomness to a
//! [`Resolution`]. The engine never touches session state.
//!
//! ## Branches
//!
//! - **Quick Burst** (drawn against `quick_burst_chance`): the vault unlocks
//!   somewhere in `1..=8` and every matching bet is paid a flat multiplier
//!   drawn once from `[50, 150]`. Not funded from the pot, no house edge.
//! - **Standard**: the vault unlocks in `[min_seconds, max_seconds]` and the
//!   matching bets share `pot * (1 - house_edge)` pro rata to stake.
//!
//! Both branches scale each payout by the global `multiplier_boost` and by the
//! personal power-up multiplier. With no matching bet the house keeps the pot.
//!
//! Randomness is split from settlement: [`draw_outcome`] consumes the RNG,
//! [`settle`] is a pure function of the outcome, so an outcome can be forced
//! for replays and tests.

use std::collections::BTreeMap;

use rand::Rng;
use timevault_types::constants::{
    POWER_UP_MULTIPLIER, QUICK_BURST_LABEL, QUICK_BURST_MAX_SECOND, QUICK_BURST_MIN_SECOND,
    QUICK_BURST_MULTIPLIER_MAX, QUICK_BURST_MULTIPLIER_MIN,
};
use timevault_types::{Bet, FairnessData, PowerUp, Resolution, RoundConfig, RoundId, WinnerRecord};
use tracing::debug;

use crate::fairness::generate_fairness;

/// The random part of a resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Standard { unlock_second: u32 },
    QuickBurst { unlock_second: u32, multiplier: f64 },
}

impl Outcome {
    pub fn unlock_second(&self) -> u32 {
        match self {
            Outcome::Standard { unlock_second } => *unlock_second,
            Outcome::QuickBurst { unlock_second, .. } => *unlock_second,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            Outcome::Standard { .. } => None,
            Outcome::QuickBurst { .. } => Some(QUICK_BURST_LABEL),
        }
    }
}

/// Draw the unlock second (and Quick Burst multiplier, if triggered).
pub fn draw_outcome(config: &RoundConfig, rng: &mut impl Rng) -> Outcome {
    if rng.gen::<f64>() < config.quick_burst_chance {
        return Outcome::QuickBurst {
            unlock_second: rng.gen_range(QUICK_BURST_MIN_SECOND..=QUICK_BURST_MAX_SECOND),
            multiplier: rng.gen_range(QUICK_BURST_MULTIPLIER_MIN..=QUICK_BURST_MULTIPLIER_MAX),
        };
    }
    // Inverted ranges are normalized instead of panicking inside gen_range.
    let low = config.min_seconds.min(config.max_seconds);
    let high = config.min_seconds.max(config.max_seconds);
    Outcome::Standard {
        unlock_second: rng.gen_range(low..=high),
    }
}

fn personal_multiplier(bet: &Bet) -> f64 {
    match bet.power_up {
        Some(PowerUp::MultiplierBoost) => POWER_UP_MULTIPLIER,
        None => 1.0,
    }
}

/// Resolve `bets` against a known outcome.
pub fn settle(
    bets: &[Bet],
    config: &RoundConfig,
    outcome: Outcome,
    fairness: FairnessData,
) -> Resolution {
    let total_pot: f64 = bets.iter().map(|bet| bet.amount).sum();
    let unlock_second = outcome.unlock_second();
    let winning: Vec<&Bet> = bets
        .iter()
        .filter(|bet| bet.second == unlock_second)
        .collect();

    let mut winners = Vec::with_capacity(winning.len());
    let mut payouts: BTreeMap<String, f64> = BTreeMap::new();

    match outcome {
        Outcome::QuickBurst { multiplier, .. } => {
            for bet in &winning {
                let effective = multiplier * config.multiplier_boost * personal_multiplier(bet);
                let payout = bet.amount * effective;
                *payouts.entry(bet.player_id.clone()).or_insert(0.0) += payout;
                winners.push(WinnerRecord {
                    player_id: bet.player_id.clone(),
                    amount: bet.amount,
                    payout,
                    multiplier: effective,
                });
            }
        }
        Outcome::Standard { .. } => {
            let winning_stake: f64 = winning.iter().map(|bet| bet.amount).sum();
            let pool = total_pot * (1.0 - config.house_edge);
            for bet in &winning {
                let share = if winning_stake > 0.0 {
                    bet.amount / winning_stake
                } else {
                    0.0
                };
                let payout = pool * share * config.multiplier_boost * personal_multiplier(bet);
                *payouts.entry(bet.player_id.clone()).or_insert(0.0) += payout;
                winners.push(WinnerRecord {
                    player_id: bet.player_id.clone(),
                    amount: bet.amount,
                    payout,
                    multiplier: if bet.amount > 0.0 {
                        payout / bet.amount
                    } else {
                        0.0
                    },
                });
            }
        }
    }

    debug!(
        unlock_second,
        total_pot,
        winners = winners.len(),
        special = outcome.label().unwrap_or("none"),
        "settled round"
    );

    Resolution {
        unlock_second,
        total_pot,
        winners,
        payouts,
        provably_fair_data: fairness,
        special_event_triggered: outcome.label().map(str::to_string),
    }
}

/// Draw an outcome and settle `bets` against it.
pub fn simulate(
    round_id: &RoundId,
    bets: &[Bet],
    config: &RoundConfig,
    rng: &mut impl Rng,
) -> Resolution {
    let outcome = draw_outcome(config, rng);
    let fairness = generate_fairness(round_id, rng);
    settle(bets, config, outcome, fairness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenario_config() -> RoundConfig {
        RoundConfig {
            min_seconds: 10,
            max_seconds: 180,
            house_edge: 0.02,
            quick_burst_chance: 0.0,
            ..RoundConfig::default()
        }
    }

    fn fairness() -> FairnessData {
        FairnessData {
            server_seed: "s".to_string(),
            client_seed: "c".to_string(),
            final_hash: "h".to_string(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_standard_pool_split_by_stake() {
        let bets = vec![
            Bet::new("A", 50, 100.0, None),
            Bet::new("B", 50, 50.0, None),
        ];
        let resolution = settle(
            &bets,
            &scenario_config(),
            Outcome::Standard { unlock_second: 50 },
            fairness(),
        );

        assert_eq!(resolution.unlock_second, 50);
        assert_eq!(resolution.special_event_triggered, None);
        assert_eq!(resolution.winners.len(), 2);
        assert_close(resolution.payouts["A"], 98.0);
        assert_close(resolution.payouts["B"], 49.0);
        assert_close(resolution.total_payout(), 147.0);
        assert_close(resolution.winners[0].multiplier, 0.98);
    }

    #[test]
    fn test_no_matching_bet_keeps_pot() {
        let bets = vec![
            Bet::new("A", 50, 100.0, None),
            Bet::new("B", 51, 50.0, None),
        ];
        let resolution = settle(
            &bets,
            &scenario_config(),
            Outcome::Standard { unlock_second: 77 },
            fairness(),
        );

        assert!(resolution.winners.is_empty());
        assert!(resolution.payouts.is_empty());
        assert_eq!(resolution.total_payout(), 0.0);
        assert_close(resolution.total_pot, 150.0);
    }

    #[test]
    fn test_zero_bets_resolves_cleanly() {
        let mut rng = StdRng::seed_from_u64(1);
        let resolution = simulate(
            &RoundId::new("round_empty"),
            &[],
            &scenario_config(),
            &mut rng,
        );

        assert!(resolution.winners.is_empty());
        assert!(resolution.payouts.is_empty());
        assert_eq!(resolution.total_pot, 0.0);
        assert!((10..=180).contains(&resolution.unlock_second));
        assert!(!resolution.provably_fair_data.final_hash.is_empty());
    }

    #[test]
    fn test_zero_stake_winner_gets_nothing() {
        let bets = vec![Bet::new("A", 20, 0.0, None)];
        let resolution = settle(
            &bets,
            &scenario_config(),
            Outcome::Standard { unlock_second: 20 },
            fairness(),
        );

        assert_eq!(resolution.winners.len(), 1);
        assert_eq!(resolution.winners[0].payout, 0.0);
        assert_eq!(resolution.winners[0].multiplier, 0.0);
    }

    #[test]
    fn test_global_and_personal_multipliers_apply_in_standard_round() {
        let config = RoundConfig {
            multiplier_boost: 2.0,
            ..scenario_config()
        };
        let bets = vec![
            Bet::new("A", 30, 100.0, Some(PowerUp::MultiplierBoost)),
            Bet::new("B", 40, 100.0, None),
        ];
        let resolution = settle(
            &bets,
            &config,
            Outcome::Standard { unlock_second: 30 },
            fairness(),
        );

        // 200 * 0.98 * 2.0 * 1.5
        assert_close(resolution.payouts["A"], 588.0);
    }

    #[test]
    fn test_quick_burst_pays_flat_multiplier_per_bet() {
        let bets = vec![
            Bet::new("A", 3, 10.0, None),
            Bet::new("B", 3, 10.0, None),
            Bet::new("C", 4, 1_000.0, None),
        ];
        let outcome = Outcome::QuickBurst {
            unlock_second: 3,
            multiplier: 100.0,
        };
        let resolution = settle(&bets, &scenario_config(), outcome, fairness());

        assert_eq!(
            resolution.special_event_triggered.as_deref(),
            Some(QUICK_BURST_LABEL)
        );
        assert_close(resolution.payouts["A"], 1_000.0);
        assert_close(resolution.payouts["B"], 1_000.0);
        assert!(!resolution.payouts.contains_key("C"));
        assert_close(resolution.winners[0].multiplier, 100.0);
    }

    #[test]
    fn test_quick_burst_power_up_is_one_and_a_half_times() {
        let bets = vec![
            Bet::new("plain", 5, 12.5, None),
            Bet::new("boosted", 5, 12.5, Some(PowerUp::MultiplierBoost)),
        ];
        let outcome = Outcome::QuickBurst {
            unlock_second: 5,
            multiplier: 73.25,
        };
        let resolution = settle(&bets, &scenario_config(), outcome, fairness());

        let plain = resolution.payouts["plain"];
        let boosted = resolution.payouts["boosted"];
        assert!((boosted - plain * 1.5).abs() <= plain * 1e-12);
    }

    #[test]
    fn test_payouts_aggregate_per_player() {
        let bets = vec![
            Bet::new("A", 50, 100.0, None),
            Bet::new("A", 50, 50.0, None),
        ];
        let resolution = settle(
            &bets,
            &scenario_config(),
            Outcome::Standard { unlock_second: 50 },
            fairness(),
        );

        assert_eq!(resolution.winners.len(), 2);
        assert_eq!(resolution.payouts.len(), 1);
        assert_close(resolution.payouts["A"], 147.0);
    }

    #[test]
    fn test_draw_outcome_respects_ranges() {
        let mut rng = StdRng::seed_from_u64(99);
        let seconds = QUICK_BURST_MIN_SECOND..=QUICK_BURST_MAX_SECOND;
        let multipliers = QUICK_BURST_MULTIPLIER_MIN..=QUICK_BURST_MULTIPLIER_MAX;

        let always_burst = RoundConfig {
            quick_burst_chance: 1.0,
            ..scenario_config()
        };
        for _ in 0..500 {
            match draw_outcome(&always_burst, &mut rng) {
                Outcome::QuickBurst {
                    unlock_second,
                    multiplier,
                } => {
                    assert!(seconds.contains(&unlock_second));
                    assert!(multipliers.contains(&multiplier));
                }
                other => panic!("expected quick burst, got {other:?}"),
            }
        }

        let never_burst = RoundConfig {
            min_seconds: 40,
            max_seconds: 45,
            ..scenario_config()
        };
        for _ in 0..500 {
            match draw_outcome(&never_burst, &mut rng) {
                Outcome::Standard { unlock_second } => assert!((40..=45).contains(&unlock_second)),
                other => panic!("expected standard outcome, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_simulate_is_deterministic_for_seed() {
        let bets = vec![Bet::new("A", 12, 5.0, None), Bet::new("B", 13, 7.0, None)];
        let config = RoundConfig {
            quick_burst_chance: 0.5,
            ..scenario_config()
        };
        let round_id = RoundId::new("round_seeded");

        let first = simulate(&round_id, &bets, &config, &mut StdRng::seed_from_u64(5));
        let second = simulate(&round_id, &bets, &config, &mut StdRng::seed_from_u64(5));
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn standard_payouts_never_exceed_pot(
            raw_bets in prop::collection::vec((10u32..20, 1u32..1_000), 0..40),
            house_edge in 0.0f64..0.5,
            seed in any::<u64>(),
        ) {
            let bets: Vec<Bet> = raw_bets
                .iter()
                .enumerate()
                .map(|(idx, (second, amount))| {
                    Bet::new(format!("p{idx}"), *second, *amount as f64, None)
                })
                .collect();
            let config = RoundConfig {
                min_seconds: 10,
                max_seconds: 19,
                house_edge,
                quick_burst_chance: 0.0,
                ..RoundConfig::default()
            };
            let mut rng = StdRng::seed_from_u64(seed);
            let resolution = simulate(&RoundId::new("round_prop"), &bets, &config, &mut rng);

            let pot: f64 = bets.iter().map(|bet| bet.amount).sum();
            prop_assert!(resolution.total_payout() <= pot * (1.0 - house_edge) + 1e-6);
            prop_assert_eq!(resolution.winners.is_empty(), resolution.payouts.is_empty());
        }
    }
}
