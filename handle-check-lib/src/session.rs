//! Interactive checking, one identifier at a time.
//!
//! Used when usernames are typed in rather than read from a file. Calls share
//! the same rate limiter and cooldown rules as a batch run, and every verdict
//! lands in the checkpoint so a later batch run skips it.

use crate::aggregator::ResultAggregator;
use crate::checker::Checker;
use crate::checkpoint::CheckpointStore;
use crate::error::HandleCheckError;
use crate::rate_limit::RateLimiter;
use crate::types::{Outcome, RunConfig};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A checker session that persists each verdict as soon as it arrives.
pub struct InteractiveSession {
    checker: Arc<dyn Checker>,
    limiter: RateLimiter,
    aggregator: ResultAggregator,
    default_cooldown: Duration,
}

impl InteractiveSession {
    /// Open a session on the checkpoint at `config.state_path`.
    ///
    /// A cooldown persisted by an earlier run is honoured before the first
    /// call. Must be called from within a Tokio runtime.
    pub fn new(config: &RunConfig, checker: Arc<dyn Checker>, cancel: CancellationToken) -> Self {
        let store = CheckpointStore::new(&config.state_path);
        let checkpoint = store.load();
        let limiter = RateLimiter::new(config.base_delay, cancel);

        if let Some(remaining) = checkpoint.cooldown_remaining(Utc::now()) {
            if let Some(deadline) = Instant::now().checked_add(remaining) {
                limiter.hold_until(deadline);
            }
        }

        Self {
            checker,
            limiter,
            // Every verdict is saved right away
            aggregator: ResultAggregator::new(checkpoint, store, 1),
            default_cooldown: config.default_cooldown,
        }
    }

    /// Check `identifier` once and record the verdict.
    ///
    /// Failures are returned, not recorded. A rate-limit failure also puts the
    /// session in cooldown, so the next call waits it out.
    pub async fn check(&self, identifier: &str) -> Result<Outcome, HandleCheckError> {
        self.limiter.acquire().await?;

        match self.checker.check(identifier).await {
            Ok(availability) => {
                let outcome = Outcome::classified(identifier, availability);
                self.aggregator.record(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                if err.is_rate_limit() {
                    let wait = err.retry_after().unwrap_or(self.default_cooldown);
                    warn!(%identifier, wait = ?wait, "Rate limited, cooling down");
                    if let Some(until) = chrono::Duration::from_std(wait)
                        .ok()
                        .and_then(|d| Utc::now().checked_add_signed(d))
                    {
                        self.aggregator.note_cooldown(until);
                    }
                    if let Some(deadline) = Instant::now().checked_add(wait) {
                        self.limiter.hold_until(deadline);
                    }
                } else {
                    debug!(%identifier, error = %err, "Check failed");
                }
                Err(err)
            }
        }
    }

    /// Verdicts recorded during this session.
    pub fn completed(&self) -> usize {
        self.aggregator.completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::types::{Availability, Status};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Rate limits the first call, then answers `Available`.
    #[derive(Default)]
    struct FloodOnce {
        calls: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Checker for FloodOnce {
        async fn check(&self, _identifier: &str) -> Result<Availability, HandleCheckError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            if calls.len() == 1 {
                Err(HandleCheckError::rate_limited(
                    "remote",
                    "FLOOD_WAIT_20",
                    Some(Duration::from_secs(20)),
                ))
            } else {
                Ok(Availability::Available)
            }
        }
    }

    fn config_in(dir: &TempDir) -> RunConfig {
        RunConfig::default()
            .with_base_delay(Duration::from_millis(10))
            .with_state_path(dir.path().join("state.json"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_verdicts_are_saved_immediately() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let checker = Arc::new(FloodOnce::default());
        let session = InteractiveSession::new(&config, checker.clone(), CancellationToken::new());

        let err = session.check("alice").await.unwrap_err();
        assert!(err.is_rate_limit());

        let outcome = session.check("alice").await.unwrap();
        assert_eq!(outcome.status, Status::Available);
        assert_eq!(session.completed(), 1);

        let calls = checker.calls.lock().unwrap().clone();
        assert!(calls[1] - calls[0] >= Duration::from_secs(20));

        let saved = CheckpointStore::new(&config.state_path)
            .try_load()
            .unwrap()
            .unwrap();
        assert_eq!(saved.outcome("alice").unwrap().status, Status::Available);
        assert!(saved.cooldown_until.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_verdicts_are_kept() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let mut checkpoint = Checkpoint::new();
        checkpoint
            .outcomes
            .insert("bob".into(), Outcome::classified("bob", Availability::Taken));
        checkpoint.pending.push_back("carol".into());
        CheckpointStore::new(&config.state_path)
            .save(&checkpoint)
            .unwrap();

        let checker = Arc::new(FloodOnce::default());
        // Burn the scripted rate limit so the next call succeeds
        checker.calls.lock().unwrap().push(Instant::now());
        let session = InteractiveSession::new(&config, checker, CancellationToken::new());

        session.check("carol").await.unwrap();

        let saved = CheckpointStore::new(&config.state_path)
            .try_load()
            .unwrap()
            .unwrap();
        assert_eq!(saved.outcome("bob").unwrap().status, Status::Taken);
        assert_eq!(saved.outcome("carol").unwrap().status, Status::Available);
        assert!(saved.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_session_makes_no_call() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let checker = Arc::new(FloodOnce::default());
        let session = InteractiveSession::new(&config_in(&dir), checker.clone(), cancel.clone());

        cancel.cancel();

        assert!(matches!(
            session.check("dave").await,
            Err(HandleCheckError::Cancelled)
        ));
        assert!(checker.calls.lock().unwrap().is_empty());
    }
}
