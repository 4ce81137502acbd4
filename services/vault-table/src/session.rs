//! Process-wide session state.
//!
//! Every mutation of shared data (a round's bets, the leaderboard, the round
//! history, per-player stats) happens inside one of the synchronous methods of
//! [`SessionState`], called while holding the single [`Session`] lock. Keeping
//! the critical sections synchronous means the lock can never be held across a
//! suspension point.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use timevault_execution::lifecycle::{self, TransitionResult};
use timevault_execution::payout;
use timevault_types::api::{LeaderboardEntry, Notification};
use timevault_types::constants::{BONUS_VAULT_MULTIPLIER, ROUND_HISTORY_LIMIT};
use timevault_types::{
    ActiveEvent, Bet, PlayerStats, Resolution, RoundConfig, RoundId, RoundRecord, RoundSnapshot,
    RoundStatus,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::audit::AuditSink;
use crate::round::{Round, RoundError};

const NOTIFICATION_BUFFER: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("player not found: {0}")]
    PlayerNotFound(String),
}

pub(crate) enum RoundPhase {
    Pending,
    Betting,
    Finished(Resolution),
}

pub(crate) struct RoundState {
    pub(crate) config: RoundConfig,
    pub(crate) active_events: Vec<String>,
    pub(crate) phase: RoundPhase,
    pub(crate) bets: Vec<Bet>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) bet_end_time: Option<u64>,
    pub(crate) bonus_awarded: bool,
    pub(crate) probe: Option<AbortHandle>,
}

impl RoundState {
    fn new(config: RoundConfig, active_events: Vec<String>) -> Self {
        Self {
            config,
            active_events,
            phase: RoundPhase::Pending,
            bets: Vec::new(),
            deadline: None,
            bet_end_time: None,
            bonus_awarded: false,
            probe: None,
        }
    }

    pub(crate) fn status(&self) -> RoundStatus {
        match self.phase {
            RoundPhase::Pending => RoundStatus::Pending,
            RoundPhase::Betting => RoundStatus::Betting,
            RoundPhase::Finished(_) => RoundStatus::Finished,
        }
    }

    fn result(&self) -> Option<&Resolution> {
        match &self.phase {
            RoundPhase::Finished(resolution) => Some(resolution),
            _ => None,
        }
    }

    fn record(&self, round_id: &RoundId) -> RoundRecord {
        RoundRecord {
            round_id: round_id.clone(),
            config: self.config.clone(),
            bets: self.bets.clone(),
            result: self.result().cloned(),
        }
    }

    fn snapshot(&self, round_id: &RoundId) -> RoundSnapshot {
        RoundSnapshot {
            round_id: round_id.clone(),
            status: self.status(),
            bet_end_time: self.bet_end_time,
            bets_placed: self.bets.len(),
            result: self.result().cloned(),
            active_events: self.active_events.clone(),
        }
    }

    fn stop_probe(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
    }
}

/// Outcome of finalizing a round.
pub(crate) struct Finalized {
    pub(crate) resolution: Resolution,
    /// `false` when the round had already been finished by an earlier call.
    pub(crate) fresh: bool,
    pub(crate) record: Option<RoundRecord>,
}

/// Outcome of a bonus vault probe hit.
#[derive(Debug, PartialEq)]
pub(crate) enum ProbeStep {
    Awarded { player_id: String, payout: f64 },
    /// No bets yet; keep polling.
    Idle,
    /// Round finished, flag already set, or round gone; stop polling.
    Closed,
}

/// Shared aggregates guarded by the session lock.
pub(crate) struct SessionState {
    current: Option<RoundId>,
    rounds: HashMap<RoundId, RoundState>,
    history: VecDeque<RoundRecord>,
    leaderboard: HashMap<String, f64>,
    stats: HashMap<String, PlayerStats>,
    pub(crate) rng: StdRng,
}

impl SessionState {
    fn new(rng: StdRng) -> Self {
        Self {
            current: None,
            rounds: HashMap::new(),
            history: VecDeque::with_capacity(ROUND_HISTORY_LIMIT + 1),
            leaderboard: HashMap::new(),
            stats: HashMap::new(),
            rng,
        }
    }

    /// Install a fresh round as the current one.
    ///
    /// A replaced round that is still betting is finalized first so its
    /// accepted bets are resolved, credited and recorded. A replaced pending
    /// round holds no bets and is dropped. Returns the records of rounds
    /// finalized here.
    fn install_round(&mut self, round_id: RoundId, round: RoundState) -> Vec<RoundRecord> {
        let mut unfinished: Vec<RoundId> = self
            .rounds
            .iter()
            .filter(|(_, state)| !matches!(state.phase, RoundPhase::Finished(_)))
            .map(|(id, _)| id.clone())
            .collect();
        unfinished.sort();

        let mut records = Vec::new();
        for id in unfinished {
            let betting = self
                .rounds
                .get(&id)
                .is_some_and(|state| lifecycle::is_betting_open(state.status()));
            if betting {
                warn!(round_id = %id, "finalizing replaced round");
                if let Ok(Finalized {
                    record: Some(record),
                    ..
                }) = self.finish_round(&id)
                {
                    records.push(record);
                }
            } else if let Some(mut state) = self.rounds.remove(&id) {
                state.stop_probe();
            }
        }

        self.rounds.insert(round_id.clone(), round);
        self.current = Some(round_id);
        records
    }

    pub(crate) fn round(&self, round_id: &RoundId) -> Result<&RoundState, RoundError> {
        self.rounds
            .get(round_id)
            .ok_or_else(|| RoundError::RoundEvicted(round_id.clone()))
    }

    pub(crate) fn round_mut(&mut self, round_id: &RoundId) -> Result<&mut RoundState, RoundError> {
        self.rounds
            .get_mut(round_id)
            .ok_or_else(|| RoundError::RoundEvicted(round_id.clone()))
    }

    /// Append a bet if the round is accepting them.
    pub(crate) fn place_bet(&mut self, round_id: &RoundId, bet: Bet) -> bool {
        let Some(round) = self.rounds.get_mut(round_id) else {
            return false;
        };
        if !lifecycle::is_betting_open(round.status()) {
            return false;
        }
        let stats = self.stats.entry(bet.player_id.clone()).or_default();
        stats.total_bet += bet.amount;
        round.bets.push(bet);
        true
    }

    /// Resolve the round exactly once. Later calls return the cached result.
    pub(crate) fn finish_round(&mut self, round_id: &RoundId) -> Result<Finalized, RoundError> {
        // Finished rounds stay in the map until their record leaves history.
        let Some(round) = self.rounds.get_mut(round_id) else {
            return Err(RoundError::RoundEvicted(round_id.clone()));
        };

        if let TransitionResult::Rejected { .. } = lifecycle::finish(round.status()) {
            if let Some(resolution) = round.result() {
                return Ok(Finalized {
                    resolution: resolution.clone(),
                    fresh: false,
                    record: None,
                });
            }
        }

        round.stop_probe();
        let resolution = payout::simulate(round_id, &round.bets, &round.config, &mut self.rng);
        round.phase = RoundPhase::Finished(resolution.clone());
        let record = round.record(round_id);

        for winner in &resolution.winners {
            *self
                .leaderboard
                .entry(winner.player_id.clone())
                .or_insert(0.0) += winner.payout;
            let stats = self.stats.entry(winner.player_id.clone()).or_default();
            stats.wins += 1;
            stats.total_won += winner.payout;
        }

        self.history.push_front(record.clone());
        while self.history.len() > ROUND_HISTORY_LIMIT {
            if let Some(evicted) = self.history.pop_back() {
                if self.current.as_ref() != Some(&evicted.round_id) {
                    self.rounds.remove(&evicted.round_id);
                }
            }
        }

        Ok(Finalized {
            resolution,
            fresh: true,
            record: Some(record),
        })
    }

    /// Try to award the bonus vault to one bet picked uniformly at random.
    pub(crate) fn award_bonus(
        &mut self,
        round_id: &RoundId,
        now: Instant,
        rng: &mut impl Rng,
    ) -> ProbeStep {
        let Some(round) = self.rounds.get_mut(round_id) else {
            return ProbeStep::Closed;
        };
        let open = round.deadline.is_some_and(|deadline| {
            lifecycle::probe_should_continue(round.status(), round.bonus_awarded, now, deadline)
        });
        if !open {
            return ProbeStep::Closed;
        }
        let Some(bet) = round.bets.choose(rng) else {
            return ProbeStep::Idle;
        };
        let player_id = bet.player_id.clone();
        let payout = bet.amount * BONUS_VAULT_MULTIPLIER;
        round.bonus_awarded = true;
        *self.leaderboard.entry(player_id.clone()).or_insert(0.0) += payout;
        ProbeStep::Awarded { player_id, payout }
    }

    fn leaderboard_top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .leaderboard
            .iter()
            .map(|(player_id, winnings)| LeaderboardEntry {
                player_id: player_id.clone(),
                winnings: *winnings,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.winnings
                .total_cmp(&a.winnings)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        entries.truncate(n);
        entries
    }
}

/// Explicit context object shared by the scheduler, the transport and every
/// round. All access funnels through one lock.
pub struct Session {
    pub(crate) state: Mutex<SessionState>,
    notifications: broadcast::Sender<Notification>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl Session {
    /// Create a session. A seed makes every draw (unlock seconds, bonus
    /// probes, fairness tokens) reproducible.
    pub fn new(seed: Option<u64>) -> Arc<Self> {
        Self::build(seed, None)
    }

    /// Create a session that appends every finished round to `sink`.
    pub fn with_audit(seed: Option<u64>, sink: Arc<dyn AuditSink>) -> Arc<Self> {
        Self::build(seed, Some(sink))
    }

    fn build(seed: Option<u64>, audit: Option<Arc<dyn AuditSink>>) -> Arc<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Arc::new(Self {
            state: Mutex::new(SessionState::new(rng)),
            notifications,
            audit,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub(crate) fn notify(&self, notification: Notification) {
        self.notifications.send(notification).ok();
    }

    pub(crate) fn audit(&self, record: RoundRecord) {
        if let Some(sink) = &self.audit {
            sink.record(record);
        }
    }

    /// Create a round in `pending`, snapshotting the base config with every
    /// active event's effects folded in (later events win).
    pub async fn create_round(
        self: &Arc<Self>,
        base: &RoundConfig,
        events: &[ActiveEvent],
    ) -> Round {
        let merged = base.with_effects(events.iter().map(|event| &event.effects));
        let config = match merged.validate() {
            Ok(()) => merged,
            Err(err) => {
                warn!(%err, "event effects produced an invalid config; using base config");
                base.clone()
            }
        };
        let round_id = new_round_id();
        let active_events = events
            .iter()
            .map(|event| event.name.clone())
            .collect::<Vec<_>>();
        if !active_events.is_empty() {
            info!(round_id = %round_id, events = ?active_events, "applying active events");
        }

        let replaced = {
            let mut state = self.state.lock().await;
            state.install_round(
                round_id.clone(),
                RoundState::new(config.clone(), active_events),
            )
        };
        for record in replaced {
            self.audit(record);
        }

        Round::new(round_id, config, Arc::clone(self))
    }

    /// Create a round and open its betting window.
    pub async fn create_and_start_round(
        self: &Arc<Self>,
        base: &RoundConfig,
        events: &[ActiveEvent],
    ) -> Result<Round, RoundError> {
        let round = self.create_round(base, events).await;
        round.start_betting().await?;
        Ok(round)
    }

    /// Handle to the most recently created round, if it is still retained.
    pub async fn current_round(self: &Arc<Self>) -> Option<Round> {
        let state = self.state.lock().await;
        let round_id = state.current.as_ref()?;
        let round = state.round(round_id).ok()?;
        Some(Round::new(
            round_id.clone(),
            round.config.clone(),
            Arc::clone(self),
        ))
    }

    pub async fn leaderboard_top(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.state.lock().await.leaderboard_top(n)
    }

    /// Finished rounds, most recent first.
    pub async fn round_history(&self) -> Vec<RoundRecord> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    pub async fn player_stats(&self, player_id: &str) -> Result<PlayerStats, SessionError> {
        self.state
            .lock()
            .await
            .stats
            .get(player_id)
            .cloned()
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))
    }

    pub(crate) async fn snapshot(&self, round_id: &RoundId) -> Result<RoundSnapshot, RoundError> {
        let state = self.state.lock().await;
        state.round(round_id).map(|round| round.snapshot(round_id))
    }
}

fn new_round_id() -> RoundId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    RoundId::new(format!("round_{}", &hex[..8]))
}
