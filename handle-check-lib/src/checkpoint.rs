//! Durable run state.
//!
//! A [`Checkpoint`] is the only state that survives a process: every outcome
//! produced so far, the identifiers still waiting to be resolved, and the
//! global cooldown deadline announced by the remote service. The
//! [`CheckpointStore`] reads and atomically rewrites it on disk.

use crate::error::HandleCheckError;
use crate::types::{Identifier, Outcome, Status};
use crate::utils::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current checkpoint schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Snapshot of progress enabling resumable runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    schema_version: String,

    /// Latest outcome per identifier
    pub outcomes: BTreeMap<Identifier, Outcome>,

    /// Identifiers not yet resolved, in dispatch order
    pub pending: VecDeque<Identifier>,

    /// No remote call should be attempted before this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,

    /// When the checkpoint was last written
    pub last_saved: DateTime<Utc>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Checkpoint {
    /// An empty checkpoint for a fresh start.
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            outcomes: BTreeMap::new(),
            pending: VecDeque::new(),
            cooldown_until: None,
            last_saved: Utc::now(),
        }
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty() && self.pending.is_empty()
    }

    /// Every identifier this checkpoint knows about.
    pub fn total_seen(&self) -> usize {
        self.pending.len() + self.outcomes.len()
    }

    /// Prior outcome for `identifier`, if any.
    pub fn outcome(&self, identifier: &str) -> Option<&Outcome> {
        self.outcomes.get(identifier)
    }

    /// Identifiers per status.
    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for outcome in self.outcomes.values() {
            *counts.entry(outcome.status).or_insert(0) += 1;
        }
        counts
    }

    /// Time left on the persisted cooldown, measured from `now`.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let until = self.cooldown_until?;
        (until - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Record that the service asked for silence until `until`.
    ///
    /// A later deadline is never shortened by an earlier one.
    pub fn extend_cooldown(&mut self, until: DateTime<Utc>) {
        match self.cooldown_until {
            Some(current) if current >= until => {}
            _ => self.cooldown_until = Some(until),
        }
    }

    /// Make `queue` the pending list of a new run.
    ///
    /// Queued identifiers lose their stale outcome so that each identifier
    /// lives either in `pending` or in `outcomes`, never both.
    pub fn begin_run(&mut self, queue: &[Identifier]) {
        for identifier in queue {
            self.outcomes.remove(identifier);
        }
        self.pending = queue.iter().cloned().collect();
    }

    /// Stamp the save time.
    pub fn touch(&mut self) {
        self.last_saved = Utc::now();
    }
}

/// Loads and atomically persists the [`Checkpoint`] file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last persisted checkpoint, or an empty one.
    ///
    /// A missing, unreadable or incompatible file is a fresh start, not a
    /// failure.
    pub fn load(&self) -> Checkpoint {
        match self.try_load() {
            Ok(Some(checkpoint)) => {
                info!(
                    path = %self.path.display(),
                    outcomes = checkpoint.outcomes.len(),
                    pending = checkpoint.pending.len(),
                    "Resuming from checkpoint"
                );
                checkpoint
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No checkpoint found, starting fresh");
                Checkpoint::new()
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable checkpoint, starting fresh");
                Checkpoint::new()
            }
        }
    }

    /// Load the checkpoint, distinguishing "absent" from "broken".
    pub fn try_load(&self) -> Result<Option<Checkpoint>, HandleCheckError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HandleCheckError::storage(
                    self.path.to_string_lossy(),
                    format!("Failed to read checkpoint: {}", e),
                ))
            }
        };

        let checkpoint: Checkpoint = serde_json::from_str(&contents).map_err(|e| {
            HandleCheckError::storage(
                self.path.to_string_lossy(),
                format!("Failed to parse checkpoint: {}", e),
            )
        })?;

        if checkpoint.schema_version != SCHEMA_VERSION {
            return Err(HandleCheckError::storage(
                self.path.to_string_lossy(),
                format!(
                    "Unsupported checkpoint schema {} (expected {})",
                    checkpoint.schema_version, SCHEMA_VERSION
                ),
            ));
        }

        Ok(Some(checkpoint))
    }

    /// Atomically replace the checkpoint file with `checkpoint`.
    ///
    /// A crash mid-write leaves the previous file intact.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), HandleCheckError> {
        let json = serde_json::to_vec_pretty(checkpoint)?;

        write_atomic(&self.path, &json).map_err(|e| {
            HandleCheckError::storage(
                self.path.to_string_lossy(),
                format!("Failed to write checkpoint: {}", e),
            )
        })?;

        debug!(
            path = %self.path.display(),
            outcomes = checkpoint.outcomes.len(),
            pending = checkpoint.pending.len(),
            "Checkpoint saved"
        );
        Ok(())
    }
}
