//! Round loop: create, open, wait out the window, resolve, broadcast, repeat.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use timevault_types::api::Notification;
use timevault_types::constants::LEADERBOARD_BROADCAST_SIZE;
use timevault_types::{Resolution, RoundConfig};
use tracing::{error, info};

use crate::events::active_events_or_empty;
use crate::round::RoundError;
use crate::session::Session;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub base: RoundConfig,
    /// Event schedule re-read before every round.
    pub events_path: Option<PathBuf>,
    /// Pause between a round's result and the next round.
    pub cooldown: Duration,
}

/// Drive a single round from creation to broadcast of its result.
pub async fn run_cycle(
    session: &Arc<Session>,
    config: &SchedulerConfig,
) -> Result<Resolution, RoundError> {
    let events = config
        .events_path
        .as_deref()
        .map(active_events_or_empty)
        .unwrap_or_default();

    let round = session.create_and_start_round(&config.base, &events).await?;
    session.notify(Notification::GameUpdate {
        payload: round.snapshot().await?,
    });

    tokio::time::sleep(round.betting_window()).await;

    let resolution = round.end_round().await?;
    session.notify(Notification::RoundResult {
        round_id: round.id().clone(),
        payload: resolution.clone(),
    });
    session.notify(Notification::LeaderboardUpdate {
        entries: session.leaderboard_top(LEADERBOARD_BROADCAST_SIZE).await,
    });
    Ok(resolution)
}

/// Run rounds back to back until the task is cancelled.
pub async fn run(session: Arc<Session>, config: SchedulerConfig) {
    info!(
        window_ms = config.base.betting_window_ms,
        cooldown_ms = config.cooldown.as_millis() as u64,
        "round scheduler started"
    );
    loop {
        if let Err(err) = run_cycle(&session, &config).await {
            error!(%err, "round cycle failed");
        }
        tokio::time::sleep(config.cooldown).await;
    }
}
