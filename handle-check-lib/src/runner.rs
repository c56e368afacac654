//! Orchestration of one complete run.

use crate::aggregator::ResultAggregator;
use crate::checker::Checker;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::concurrent::WorkerPool;
use crate::error::HandleCheckError;
use crate::output::{ensure_output_dir, write_results};
use crate::rate_limit::RateLimiter;
use crate::tasks::assemble_tasks;
use crate::types::{Identifier, RunConfig, RunReport};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the worker pool over an identifier list with resume support.
///
/// # Example
///
/// ```rust,no_run
/// use handle_check_lib::{HttpChecker, RunConfig, Runner, ShutdownController};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = HttpChecker::new("https://example.org/users/{username}", Duration::from_secs(10))?;
///     let runner = Runner::new(RunConfig::default(), Arc::new(checker));
///     let shutdown = ShutdownController::new();
///     shutdown.listen_for_signals();
///
///     let input = vec!["alice".to_string(), "bob".to_string()];
///     let report = runner.run(&input, shutdown.token()).await?;
///     println!("{} checked, {} pending", report.completed, report.pending);
///     Ok(())
/// }
/// ```
pub struct Runner {
    config: RunConfig,
    checker: Arc<dyn Checker>,
}

impl Runner {
    pub fn new(config: RunConfig, checker: Arc<dyn Checker>) -> Self {
        Self { config, checker }
    }

    /// The configuration this runner was built with.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The queue a run would process for `input`, given the saved checkpoint.
    pub fn plan(&self, input: &[Identifier]) -> Vec<Identifier> {
        let checkpoint = CheckpointStore::new(&self.config.state_path).load();
        assemble_tasks(input, &checkpoint)
    }

    /// Check every identifier in `input` that still needs checking.
    ///
    /// Cancelling `cancel` stops the run at the next suspension point; the
    /// checkpoint is saved either way, and result files are only written when
    /// the queue was fully drained.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned (the output directory cannot be
    /// created). Per-identifier and storage failures are logged.
    pub async fn run(
        &self,
        input: &[Identifier],
        cancel: CancellationToken,
    ) -> Result<RunReport, HandleCheckError> {
        let started = Instant::now();
        ensure_output_dir(&self.config.output_dir)?;

        let store = CheckpointStore::new(&self.config.state_path);
        let mut checkpoint = store.load();
        let queue = assemble_tasks(input, &checkpoint);
        checkpoint.begin_run(&queue);
        let cooldown = checkpoint.cooldown_remaining(Utc::now());

        let aggregator = Arc::new(ResultAggregator::new(
            checkpoint,
            store,
            self.config.save_every,
        ));
        if let Err(e) = aggregator.save() {
            warn!(error = %e, "Could not record the queue in the checkpoint");
        }

        info!(
            queued = queue.len(),
            input = input.len(),
            workers = self.config.workers(),
            "Run starting"
        );

        if !queue.is_empty() {
            if let Some(wait) = cooldown {
                info!(wait = ?wait, "Waiting out cooldown from previous run");
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            if !cancel.is_cancelled() {
                let limiter = Arc::new(RateLimiter::new(self.config.base_delay, cancel.clone()));
                let pool = WorkerPool::new(
                    Arc::clone(&self.checker),
                    limiter,
                    Arc::clone(&aggregator),
                    self.config.clone(),
                    cancel.clone(),
                );
                pool.run(queue.clone()).await;
            }
        }

        if let Err(e) = aggregator.save() {
            warn!(error = %e, "Final checkpoint save failed");
        }

        let checkpoint: Checkpoint = aggregator.checkpoint();
        let interrupted = cancel.is_cancelled() && !checkpoint.pending.is_empty();

        if interrupted {
            info!(
                pending = checkpoint.pending.len(),
                "Run interrupted, progress saved for resume"
            );
        } else {
            write_results(&self.config.output_dir, &aggregator.results(), &checkpoint);
        }

        let report = RunReport {
            queued: queue.len(),
            completed: aggregator.completed(),
            counts: checkpoint.counts(),
            pending: checkpoint.pending.len(),
            interrupted,
            elapsed: started.elapsed(),
        };
        info!(
            completed = report.completed,
            pending = report.pending,
            interrupted,
            "Run finished"
        );
        Ok(report)
    }
}
