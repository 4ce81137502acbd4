//! Global event schedule.
//!
//! Events live in a YAML file:
//!
//! ```yaml
//! events:
//!   - name: Double Trouble
//!     enabled: true
//!     start_time: "2026-10-01T00:00:00+00:00"
//!     end_time: "2026-10-31T23:59:59+00:00"
//!     effects:
//!       multiplierBoost: 2.0
//! ```
//!
//! Only enabled events whose window contains "now" are active. A malformed
//! entry is skipped without discarding the rest of the file.

use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use timevault_types::{ActiveEvent, EventEffects};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EventConfigError {
    #[error("read event config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse event config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Deserialize)]
struct EventFile {
    #[serde(default)]
    events: Option<Vec<serde_yaml::Value>>,
}

#[derive(Deserialize)]
struct EventEntry {
    name: String,
    #[serde(default)]
    enabled: bool,
    start_time: String,
    end_time: String,
    #[serde(default)]
    effects: EventEffects,
}

/// Parse an ISO-8601 timestamp. Timestamps without an offset are read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Events from `raw` that are enabled and active at `now`.
pub fn parse_active_events(
    raw: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveEvent>, EventConfigError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: EventFile = serde_yaml::from_str(raw)?;

    let mut active = Vec::new();
    for (idx, value) in file.events.unwrap_or_default().into_iter().enumerate() {
        let entry = match serde_yaml::from_value::<EventEntry>(value) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(index = idx, %err, "skipping malformed event");
                continue;
            }
        };
        if !entry.enabled {
            continue;
        }
        let window = (
            parse_timestamp(&entry.start_time),
            parse_timestamp(&entry.end_time),
        );
        let (Some(start), Some(end)) = window else {
            warn!(name = %entry.name, "skipping event with unparseable window");
            continue;
        };
        if start <= now && now <= end {
            active.push(ActiveEvent {
                name: entry.name,
                effects: entry.effects,
            });
        }
    }
    Ok(active)
}

pub fn load_active_events(
    path: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveEvent>, EventConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_active_events(&raw, now)
}

/// Load the events active right now, degrading to none on any failure.
pub fn active_events_or_empty(path: &Path) -> Vec<ActiveEvent> {
    match load_active_events(path, Utc::now()) {
        Ok(events) => {
            if !events.is_empty() {
                let names: Vec<&str> = events.iter().map(|event| event.name.as_str()).collect();
                info!(?names, "active global events");
            }
            events
        }
        Err(EventConfigError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "event config not found; running without global events");
            Vec::new()
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to load event config");
            Vec::new()
        }
    }
}
