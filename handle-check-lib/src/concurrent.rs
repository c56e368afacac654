//! Concurrent processing of the identifier queue.
//!
//! A fixed pool of workers drains one shared FIFO queue. Every remote call
//! goes through the shared [`RateLimiter`]; every terminal outcome goes
//! through the shared [`ResultAggregator`].

use crate::aggregator::ResultAggregator;
use crate::checker::Checker;
use crate::error::HandleCheckError;
use crate::rate_limit::{escalated_period, RateLimiter};
use crate::types::{Identifier, Outcome, RunConfig};
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cap for cooldowns too long to represent as a deadline (one year)
const FAR_FUTURE_SECS: u64 = 365 * 24 * 60 * 60;

struct Shared {
    checker: Arc<dyn Checker>,
    limiter: Arc<RateLimiter>,
    aggregator: Arc<ResultAggregator>,
    config: RunConfig,
    cancel: CancellationToken,
}

/// Fixed-size pool of workers sharing one queue.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(
        checker: Arc<dyn Checker>,
        limiter: Arc<RateLimiter>,
        aggregator: Arc<ResultAggregator>,
        config: RunConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                checker,
                limiter,
                aggregator,
                config,
                cancel,
            }),
        }
    }

    /// Process `queue` until it is drained or the run is cancelled.
    ///
    /// Identifiers not resolved when cancellation lands stay pending in the
    /// aggregator's checkpoint.
    pub async fn run(&self, queue: Vec<Identifier>) {
        let total = queue.len();
        let (tx, rx) = mpsc::unbounded_channel();
        for identifier in queue {
            // Cannot fail, the receiver is still held here
            let _ = tx.send(identifier);
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let workers = self.shared.config.workers();
        info!(workers, identifiers = total, "Starting worker pool");

        let handles = (0..workers).map(|worker_id| {
            let shared = Arc::clone(&self.shared);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move { shared.work(worker_id, rx).await })
        });

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!(error = %e, "Worker task failed");
            }
        }

        debug!("Worker pool drained");
    }
}

impl Shared {
    async fn work(&self, worker_id: usize, queue: Arc<Mutex<mpsc::UnboundedReceiver<Identifier>>>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let next = {
                let mut rx = queue.lock().await;
                rx.recv().await
            };
            let Some(identifier) = next else { break };

            match self.process(&identifier).await {
                Some(outcome) => self.aggregator.record(outcome),
                None => {
                    debug!(worker_id, %identifier, "Abandoned on shutdown, left pending");
                    break;
                }
            }
        }
        debug!(worker_id, "Worker finished");
    }

    /// Run the attempt loop for one identifier.
    ///
    /// Returns None if the run was cancelled before a terminal outcome.
    async fn process(&self, identifier: &str) -> Option<Outcome> {
        self.aggregator.begin(identifier);

        let attempts = self.config.attempts();
        let mut last_error: Option<HandleCheckError> = None;

        for attempt in 0..attempts {
            if self.limiter.acquire().await.is_err() {
                return None;
            }

            let result = self.checker.check(identifier).await;
            if self.cancel.is_cancelled() {
                return None;
            }

            match result {
                Ok(availability) => {
                    debug!(%identifier, ?availability, attempt, "Classified");
                    return Some(Outcome::classified(identifier, availability));
                }
                Err(err) if err.is_rate_limit() => {
                    let wait = err.retry_after().unwrap_or(self.config.default_cooldown);
                    warn!(%identifier, attempt, wait = ?wait, "Rate limited, cooling down");

                    if let Some(until) = chrono::Duration::from_std(wait)
                        .ok()
                        .and_then(|d| Utc::now().checked_add_signed(d))
                    {
                        self.aggregator.note_cooldown(until);
                    }
                    let now = Instant::now();
                    let deadline = now
                        .checked_add(wait)
                        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS));
                    self.limiter.hold_until(deadline);
                    self.limiter
                        .replace(escalated_period(self.config.base_delay, attempt));

                    if !self.pause(wait).await {
                        return None;
                    }
                    last_error = Some(err);
                }
                Err(err) => {
                    debug!(%identifier, attempt, error = %err, "Check failed");
                    last_error = Some(err);
                    if attempt + 1 < attempts
                        && !self.pause(Duration::from_secs(u64::from(attempt) + 1)).await
                    {
                        return None;
                    }
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retries exhausted".to_string());
        warn!(%identifier, attempts, error = %detail, "Giving up");
        Some(Outcome::failed(identifier, detail))
    }

    /// Sleep for `duration` unless cancelled first; false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }
}
