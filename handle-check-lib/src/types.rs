//! Core data types for username availability checking.
//!
//! This module defines the main data structures used throughout the library:
//! classification results, per-identifier outcomes, run configuration and the
//! report returned at the end of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The unit of work: an opaque username string.
pub type Identifier = String;

/// Classification returned by a [`Checker`](crate::Checker) for one identifier.
///
/// This is the remote service's answer; failures are reported separately as
/// errors so the worker pool can decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    /// The identifier can be claimed
    Available,
    /// Someone already holds the identifier
    Taken,
    /// The service rejects the identifier's format
    Invalid,
    /// The identifier is held but offered for sale
    Purchasable,
}

/// Terminal status recorded for an identifier.
///
/// Ordering follows declaration order and drives the order of output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Available,
    Taken,
    Invalid,
    Purchasable,
    /// Retries were exhausted without a classification
    Error,
}

impl Status {
    /// All statuses, in output order.
    pub const ALL: [Status; 5] = [
        Status::Available,
        Status::Taken,
        Status::Invalid,
        Status::Purchasable,
        Status::Error,
    ];

    /// Lowercase name, as used in file names and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::Taken => "taken",
            Status::Invalid => "invalid",
            Status::Purchasable => "purchasable",
            Status::Error => "error",
        }
    }

    /// Whether identifiers with this status are re-queued on the next run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Status::Error)
    }
}

impl From<Availability> for Status {
    fn from(availability: Availability) -> Self {
        match availability {
            Availability::Available => Status::Available,
            Availability::Taken => Status::Taken,
            Availability::Invalid => Status::Invalid,
            Availability::Purchasable => Status::Purchasable,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result for one identifier in one run.
///
/// Created once per successful or exhausted-retry attempt and never mutated;
/// reprocessing the identifier replaces it with a newer `Outcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The identifier that was checked
    #[serde(rename = "username")]
    pub identifier: Identifier,

    /// Final classification
    pub status: Status,

    /// When the outcome was produced
    #[serde(rename = "check_time")]
    pub checked_at: DateTime<Utc>,

    /// Last failure detail when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    /// Outcome for an identifier the service classified.
    pub fn classified(identifier: impl Into<Identifier>, availability: Availability) -> Self {
        Self {
            identifier: identifier.into(),
            status: availability.into(),
            checked_at: Utc::now(),
            error: None,
        }
    }

    /// Outcome for an identifier whose retries ran out.
    pub fn failed(identifier: impl Into<Identifier>, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            status: Status::Error,
            checked_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Configuration for one run of the worker pool.
///
/// Passed explicitly into every component at construction time.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of concurrent workers
    /// Default: 1, Range: 1-100
    pub worker_count: usize,

    /// Period between rate-limiter tokens before any escalation
    /// Default: 3 seconds
    pub base_delay: Duration,

    /// Attempts per identifier (rate-limit hits count too)
    /// Default: 3, Minimum: 1
    pub max_retries: u32,

    /// Where the checkpoint lives
    /// Default: state.json
    pub state_path: PathBuf,

    /// Directory receiving the per-status lists and detailed JSON
    /// Default: results
    pub output_dir: PathBuf,

    /// Save the checkpoint after this many completed outcomes
    /// Default: 10
    pub save_every: usize,

    /// Cooldown applied when the service does not say how long to wait
    /// Default: 60 seconds
    pub default_cooldown: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            base_delay: Duration::from_secs(3),
            max_retries: 3,
            state_path: PathBuf::from("state.json"),
            output_dir: PathBuf::from("results"),
            save_every: 10,
            default_cooldown: Duration::from_secs(60),
        }
    }
}

impl RunConfig {
    /// Set the number of workers, clamped to 1-100.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_count = workers.clamp(1, 100);
        self
    }

    /// Set the base token period.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set attempts per identifier; zero is treated as one.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Set the checkpoint path.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set how many outcomes trigger a periodic save.
    pub fn with_save_every(mut self, every: usize) -> Self {
        self.save_every = every.max(1);
        self
    }

    /// Set the fallback cooldown for unparsable rate-limit signals.
    pub fn with_default_cooldown(mut self, cooldown: Duration) -> Self {
        self.default_cooldown = cooldown;
        self
    }

    /// Effective attempt budget (never below one).
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Effective worker count (never below one).
    pub fn workers(&self) -> usize {
        self.worker_count.max(1)
    }
}

/// Summary returned by [`Runner::run`](crate::Runner::run).
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Identifiers queued for this run
    pub queued: usize,

    /// Outcomes produced during this run
    pub completed: usize,

    /// Identifiers per status across the whole checkpoint
    pub counts: BTreeMap<Status, usize>,

    /// Identifiers still pending when the run ended
    pub pending: usize,

    /// Whether the run was cut short by a shutdown signal
    pub interrupted: bool,

    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of identifiers recorded with `status`.
    pub fn count(&self, status: Status) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}
