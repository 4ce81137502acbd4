//! Handle to a single round and its bonus vault probe.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use timevault_execution::lifecycle::{self, TransitionResult};
use timevault_types::api::Notification;
use timevault_types::constants::BONUS_PROBE_INTERVAL_MS;
use timevault_types::{Bet, PowerUp, Resolution, RoundConfig, RoundId, RoundSnapshot, RoundStatus};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::{ProbeStep, RoundPhase, Session};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("round {round_id} cannot open betting from {}", .from.as_str())]
    InvalidTransition {
        round_id: RoundId,
        from: RoundStatus,
    },
    #[error("round {0} is no longer retained")]
    RoundEvicted(RoundId),
}

/// Cheap, cloneable handle to a round owned by a [`Session`].
///
/// The round's mutable state lives inside the session so that bets, the bonus
/// probe and resolution are all ordered by the same lock.
#[derive(Clone)]
pub struct Round {
    id: RoundId,
    config: RoundConfig,
    session: Arc<Session>,
}

impl Round {
    pub(crate) fn new(id: RoundId, config: RoundConfig, session: Arc<Session>) -> Self {
        Self { id, config, session }
    }

    pub fn id(&self) -> &RoundId {
        &self.id
    }

    /// Config snapshot taken at creation, with event effects applied.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn betting_window(&self) -> Duration {
        Duration::from_millis(self.config.betting_window_ms)
    }

    /// Open the betting window, arm the deadline and launch the bonus probe.
    pub async fn start_betting(&self) -> Result<(), RoundError> {
        let mut state = self.session.state.lock().await;
        let probe_seed: u64 = state.rng.gen();
        let round = state.round_mut(&self.id)?;
        match lifecycle::start_betting(round.status()) {
            TransitionResult::Rejected { from } => {
                return Err(RoundError::InvalidTransition {
                    round_id: self.id.clone(),
                    from,
                })
            }
            TransitionResult::TransitionTo { .. } => {}
        }

        let deadline = Instant::now() + self.betting_window();
        let bet_end_time = lifecycle::betting_deadline_ms(unix_ms(), &self.config);
        round.phase = RoundPhase::Betting;
        round.deadline = Some(deadline);
        round.bet_end_time = Some(bet_end_time);

        let probe = tokio::spawn(run_bonus_probe(
            Arc::clone(&self.session),
            self.id.clone(),
            deadline,
            lifecycle::probe_tick_chance(&self.config),
            StdRng::seed_from_u64(probe_seed),
        ));
        round.probe = Some(probe.abort_handle());
        drop(state);

        info!(round_id = %self.id, bet_end_time, "betting open");
        Ok(())
    }

    /// Append a bet. Returns `false` (and changes nothing) unless the round
    /// is currently betting.
    pub async fn place_bet(
        &self,
        player_id: impl Into<String>,
        second: u32,
        amount: f64,
        power_up: Option<PowerUp>,
    ) -> bool {
        let accepted = {
            let mut state = self.session.state.lock().await;
            state.place_bet(&self.id, Bet::new(player_id, second, amount, power_up))
        };
        if accepted {
            self.session.notify(Notification::NewBet {
                round_id: self.id.clone(),
                second,
                amount,
            });
        } else {
            debug!(round_id = %self.id, "bet rejected; round not betting");
        }
        accepted
    }

    /// Resolve the round. Idempotent: after the first call every call returns
    /// the same resolution without touching the aggregates again.
    pub async fn end_round(&self) -> Result<Resolution, RoundError> {
        let finalized = {
            let mut state = self.session.state.lock().await;
            state.finish_round(&self.id)?
        };
        if finalized.fresh {
            info!(
                round_id = %self.id,
                unlock_second = finalized.resolution.unlock_second,
                total_pot = finalized.resolution.total_pot,
                winners = finalized.resolution.winners.len(),
                special_event = ?finalized.resolution.special_event_triggered,
                "round finished"
            );
            if let Some(record) = finalized.record {
                self.session.audit(record);
            }
        }
        Ok(finalized.resolution)
    }

    pub async fn snapshot(&self) -> Result<RoundSnapshot, RoundError> {
        self.session.snapshot(&self.id).await
    }
}

/// Periodically roll for the bonus vault until the window closes, the round
/// finishes, or the bonus has been awarded.
async fn run_bonus_probe(
    session: Arc<Session>,
    round_id: RoundId,
    deadline: Instant,
    tick_chance: f64,
    mut rng: StdRng,
) {
    let period = Duration::from_millis(BONUS_PROBE_INTERVAL_MS);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        if Instant::now() >= deadline {
            break;
        }
        if rng.gen::<f64>() >= tick_chance {
            continue;
        }
        let step = {
            let mut state = session.state.lock().await;
            state.award_bonus(&round_id, Instant::now(), &mut rng)
        };
        match step {
            ProbeStep::Awarded { player_id, payout } => {
                info!(
                    round_id = %round_id,
                    player_id = %player_id,
                    payout,
                    "bonus vault awarded"
                );
                session.notify(Notification::BonusVaultWin {
                    round_id: round_id.clone(),
                    player_id,
                    payout,
                });
                break;
            }
            ProbeStep::Idle => {}
            ProbeStep::Closed => break,
        }
    }
    debug!(round_id = %round_id, "bonus probe stopped");
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
