use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use timevault_table::balance::{run_balance, BalanceParams};
use timevault_types::RoundConfig;
use tracing::info;

/// Run the payout engine over synthetic rounds and report the realized edge.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of rounds to simulate.
    #[arg(short, long, default_value_t = 100)]
    rounds: u64,

    /// YAML file with round parameters (missing keys use defaults).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 50)]
    min_bets: usize,

    #[arg(long, default_value_t = 200)]
    max_bets: usize,

    /// Size of the synthetic player pool.
    #[arg(long, default_value_t = 50)]
    players: usize,

    /// How many of the most frequent unlock seconds to list.
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Print one line per round.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RoundConfig> {
    let Some(path) = path else {
        return Ok(RoundConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    let config: RoundConfig = serde_yaml::from_str(&raw).context("parse round config")?;
    config.validate().context("invalid round config")?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let params = BalanceParams {
        rounds: args.rounds,
        min_bets: args.min_bets,
        max_bets: args.max_bets,
        players: args.players,
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(rounds = params.rounds, ?config, "starting balance simulation");
    let report = run_balance(&config, &params, &mut rng);

    if args.verbose {
        for (idx, round) in report.rounds.iter().enumerate() {
            println!(
                "Round {}: unlocked at {}s. Pot: ${:.2}, Payout: ${:.2}{}",
                idx + 1,
                round.unlock_second,
                round.pot,
                round.paid,
                round
                    .special_event
                    .as_deref()
                    .map(|label| format!(" [{label}]"))
                    .unwrap_or_default()
            );
        }
    }

    println!("Total value of bets:    ${:.2}", report.total_bet);
    println!("Total value of payouts: ${:.2}", report.total_paid);
    if let Some(edge) = report.realized_house_edge() {
        println!(
            "Realized house edge:    {:.4}% (target {:.2}%)",
            edge * 100.0,
            config.house_edge * 100.0
        );
    }
    println!("Top {} unlock seconds:", args.top);
    for (second, count) in report.top_seconds(args.top) {
        println!("  second {second}: {count} rounds");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_args() {
        let args = Args::parse_from(["simulate-rounds", "--rounds", "500", "--seed", "7", "-v"]);
        assert_eq!(args.rounds, 500);
        assert_eq!(args.seed, Some(7));
        assert!(args.verbose);
        assert_eq!(args.top, 10);
    }

    #[test]
    fn loads_partial_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round.yaml");
        std::fs::write(&path, "house_edge: 0.05\nquick_burst_chance: 0.0\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.house_edge, 0.05);
        assert_eq!(config.max_seconds, RoundConfig::default().max_seconds);

        std::fs::write(&path, "house_edge: 1.0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
