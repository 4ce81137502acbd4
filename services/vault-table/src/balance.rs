//! Offline balancing: run the payout engine over many synthetic rounds and
//! measure the realized house edge.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use timevault_execution::payout;
use timevault_types::{Bet, Resolution, RoundConfig, RoundId};

const STAKES: [f64; 6] = [1.0, 5.0, 10.0, 25.0, 50.0, 100.0];

#[derive(Clone, Debug)]
pub struct BalanceParams {
    pub rounds: u64,
    pub min_bets: usize,
    pub max_bets: usize,
    pub players: usize,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            rounds: 100,
            min_bets: 50,
            max_bets: 200,
            players: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoundSummary {
    pub unlock_second: u32,
    pub pot: f64,
    pub paid: f64,
    pub special_event: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct BalanceReport {
    pub rounds: Vec<RoundSummary>,
    pub total_bet: f64,
    pub total_paid: f64,
    pub unlock_counts: BTreeMap<u32, u64>,
}

impl BalanceReport {
    fn record(&mut self, resolution: &Resolution) {
        let paid = resolution.total_payout();
        self.total_bet += resolution.total_pot;
        self.total_paid += paid;
        *self
            .unlock_counts
            .entry(resolution.unlock_second)
            .or_insert(0) += 1;
        self.rounds.push(RoundSummary {
            unlock_second: resolution.unlock_second,
            pot: resolution.total_pot,
            paid,
            special_event: resolution.special_event_triggered.clone(),
        });
    }

    /// `(bet - paid) / bet`, or `None` when nothing was wagered.
    pub fn realized_house_edge(&self) -> Option<f64> {
        (self.total_bet > 0.0).then(|| (self.total_bet - self.total_paid) / self.total_bet)
    }

    /// Most frequent unlock seconds, ties broken by the lower second.
    pub fn top_seconds(&self, n: usize) -> Vec<(u32, u64)> {
        let mut counts: Vec<(u32, u64)> = self
            .unlock_counts
            .iter()
            .map(|(s, c)| (*s, *c))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }
}

/// Random bets spread uniformly over the standard unlock range.
pub fn generate_bets(
    config: &RoundConfig,
    params: &BalanceParams,
    rng: &mut impl Rng,
) -> Vec<Bet> {
    let (low, high) = if config.min_seconds <= config.max_seconds {
        (config.min_seconds, config.max_seconds)
    } else {
        (config.max_seconds, config.min_seconds)
    };
    let (min_bets, max_bets) = if params.min_bets <= params.max_bets {
        (params.min_bets, params.max_bets)
    } else {
        (params.max_bets, params.min_bets)
    };
    let count = rng.gen_range(min_bets..=max_bets);
    let players = params.players.max(1);
    (0..count)
        .map(|_| {
            let player = format!("sim_player_{}", rng.gen_range(1..=players));
            let second = rng.gen_range(low..=high);
            let amount = *STAKES.choose(rng).unwrap_or(&1.0);
            Bet::new(player, second, amount, None)
        })
        .collect()
}

pub fn run_balance(
    config: &RoundConfig,
    params: &BalanceParams,
    rng: &mut impl Rng,
) -> BalanceReport {
    let mut report = BalanceReport::default();
    for idx in 0..params.rounds {
        let bets = generate_bets(config, params, rng);
        let round_id = RoundId::new(format!("sim_{idx:08x}"));
        let resolution = payout::simulate(&round_id, &bets, config, rng);
        report.record(&resolution);
    }
    report
}
