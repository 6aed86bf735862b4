use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::schema::{AnswerEvent, ProgressSnapshot, SCHEMA_VERSION};
use crate::store::{QuizStore, StoreError, quarantine};

/// A write the store refused, waiting to be replayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingWrite {
    Answer(AnswerEvent),
    Progress(ProgressSnapshot),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub pending: bool,
    pub queued_at: DateTime<Utc>,
    pub write: PendingWrite,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PendingQueueData {
    schema_version: u32,
    records: Vec<PendingRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub replayed: usize,
    pub remaining: usize,
}

/// FIFO of deferred writes. File-backed queues survive restarts; the
/// in-memory variant only lasts as long as the session.
#[derive(Debug, Default)]
pub struct PendingQueue {
    path: Option<PathBuf>,
    records: Vec<PendingRecord>,
}

impl PendingQueue {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or start) the queue stored at `path`. A file that does not parse
    /// is moved aside to `<name>.corrupt-<time>` and an empty queue starts.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let records = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<PendingQueueData>(&content) {
                Ok(data) => data.records,
                Err(e) => {
                    let moved = quarantine(&path)?;
                    log::warn!(
                        "Pending queue at {} unreadable ({e}), moved to {}",
                        path.display(),
                        moved.display()
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path),
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PendingRecord] {
        &self.records
    }

    pub fn push(&mut self, write: PendingWrite) {
        self.records.push(PendingRecord {
            pending: true,
            queued_at: Utc::now(),
            write,
        });
        self.persist();
    }

    /// Replay queued writes oldest first. Stops at the first failure and keeps
    /// that record and everything after it for a later attempt.
    pub fn flush<S: QuizStore + ?Sized>(&mut self, store: &mut S) -> FlushReport {
        let mut replayed = 0;
        for record in &self.records {
            let result = match &record.write {
                PendingWrite::Answer(event) => store.append_answer_event(event),
                PendingWrite::Progress(snapshot) => store.append_progress_snapshot(snapshot),
            };
            if let Err(e) = result {
                log::debug!("Replay stopped after {replayed} record(s): {e}");
                break;
            }
            replayed += 1;
        }
        if replayed > 0 {
            self.records.drain(..replayed);
            self.persist();
        }
        FlushReport {
            replayed,
            remaining: self.records.len(),
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = self.save(path) {
            log::error!("Failed to persist pending queue to {}: {e}", path.display());
        }
    }

    fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = PendingQueueData {
            schema_version: SCHEMA_VERSION,
            records: self.records.clone(),
        };
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
