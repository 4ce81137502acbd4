//! Append-only audit trail of finished rounds.
//!
//! Rounds are handed to a dedicated writer thread over a bounded channel so the
//! session lock is never held while touching the filesystem.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use timevault_types::RoundRecord;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Destination for finished round records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: RoundRecord);
}

/// One line of the JSONL audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub logged_at: u64,
    #[serde(flatten)]
    pub round: RoundRecord,
}

enum AuditRequest {
    Round(RoundRecord),
    Shutdown(oneshot::Sender<()>),
}

pub struct JsonlAuditLog {
    sender: mpsc::Sender<AuditRequest>,
}

impl JsonlAuditLog {
    /// Open (or create) the log for appending and start the writer thread.
    pub fn start(path: &Path, buffer_size: usize) -> anyhow::Result<Self> {
        if let Some(parent) = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).context("create audit log directory")?;
        }
        let file = open_append(path).context("open audit log")?;

        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let path = path.to_path_buf();
        std::thread::spawn(move || {
            audit_worker(path, file, receiver);
        });

        Ok(Self { sender })
    }

    /// Flush every record queued so far and stop the writer. Records handed
    /// in afterwards are dropped.
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(AuditRequest::Shutdown(ack)).await.is_err() {
            return;
        }
        if done.await.is_err() {
            error!("audit writer stopped before acknowledging shutdown");
        }
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: RoundRecord) {
        let round_id = record.round_id.clone();
        match self.sender.try_send(AuditRequest::Round(record)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%round_id, "audit channel full; dropping round record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(%round_id, "audit writer stopped; dropping round record");
            }
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn audit_worker(path: PathBuf, mut file: File, mut receiver: mpsc::Receiver<AuditRequest>) {
    while let Some(request) = receiver.blocking_recv() {
        let round = match request {
            AuditRequest::Round(round) => round,
            AuditRequest::Shutdown(ack) => {
                debug!(path = %path.display(), "audit writer stopped");
                let _ = ack.send(());
                return;
            }
        };
        let entry = AuditEntry {
            logged_at: unix_ms(),
            round,
        };
        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(err) => {
                error!("audit encode failed: {err}");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(err) = file.write_all(&line).and_then(|_| file.flush()) {
            error!(path = %path.display(), "audit write failed: {err}");
        }
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
