//! Graceful shutdown coordination.
//!
//! A [`ShutdownController`] owns the run's [`CancellationToken`]. Ctrl-C (and
//! SIGTERM on Unix) cancel it; every suspension point in the worker pool and
//! the rate limiter observes the token, and the runner then performs the final
//! checkpoint save.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates graceful shutdown across the run's tasks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token every component of the run should observe.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested, finishing up");
            self.token.cancel();
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// Spawn a task that triggers shutdown on the first interruption signal.
    ///
    /// The task ends on its own once shutdown has been triggered by any means.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = controller.wait() => {}
                received = interruption() => {
                    if received {
                        controller.trigger();
                    }
                }
            }
        })
    }
}

#[cfg(unix)]
async fn interruption() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM, Ctrl-C only");
            return tokio::signal::ctrl_c().await.is_ok();
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn interruption() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            false
        }
    }
}
