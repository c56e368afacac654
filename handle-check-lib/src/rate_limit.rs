//! Token-issuing rate limiter with runtime-replaceable period.
//!
//! One background ticker task feeds a single-slot channel, issuing at most one
//! token per period. Escalating backoff swaps in a new ticker with a longer
//! period; the old ticker is retired on the spot so exactly one ticker task is
//! alive at any time.

use crate::error::HandleCheckError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A ticker issuing tokens at a fixed period into a one-slot channel.
struct Ticker {
    period: Duration,
    tokens: tokio::sync::Mutex<mpsc::Receiver<()>>,
    retire: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Spawn a ticker whose first token arrives one `period` from now.
    fn spawn(period: Duration, parent: &CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let retire = parent.child_token();
        let stop = retire.clone();

        let handle = tokio::spawn(async move {
            loop {
                // The slot frees up only once the previous token is claimed;
                // the period is counted from there.
                let slot = tokio::select! {
                    _ = stop.cancelled() => break,
                    slot = tx.reserve() => match slot {
                        Ok(slot) => slot,
                        Err(_) => break,
                    },
                };
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = sleep(period) => slot.send(()),
                }
            }
        });

        Self {
            period,
            tokens: tokio::sync::Mutex::new(rx),
            retire,
            handle,
        }
    }

    fn retire(&self) {
        self.retire.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.retire.cancel();
        self.handle.abort();
    }
}

/// Shared rate limiter handed to every worker.
///
/// `acquire` waits for a token; `replace` swaps the period. Both observe the
/// run's cancellation token.
pub struct RateLimiter {
    active: Mutex<Arc<Ticker>>,
    hold_until: Mutex<Option<Instant>>,
    cancel: CancellationToken,
}

impl RateLimiter {
    /// Start a limiter issuing one token per `period`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        let ticker = Ticker::spawn(period, &cancel);
        Self {
            active: Mutex::new(Arc::new(ticker)),
            hold_until: Mutex::new(None),
            cancel,
        }
    }

    /// Period of the currently active ticker.
    pub fn period(&self) -> Duration {
        self.current().period
    }

    fn current(&self) -> Arc<Ticker> {
        match self.active.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Wait for permission to make one remote call.
    ///
    /// Returns `Err(Cancelled)` as soon as the run is cancelled, never a
    /// token. A caller waiting on a ticker that gets retired moves on to the
    /// replacement; a token the old ticker already issued is still honoured.
    /// A token that arrives while a cooldown hold is active is dropped, and
    /// the caller waits out the hold before asking for a fresh one.
    pub async fn acquire(&self) -> Result<(), HandleCheckError> {
        loop {
            self.wait_for_hold().await?;
            let ticker = self.current();

            let mut tokens = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(HandleCheckError::Cancelled),
                guard = ticker.tokens.lock() => guard,
            };

            let token = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(HandleCheckError::Cancelled),
                token = tokens.recv() => token,
            };
            drop(tokens);

            match token {
                // Retired and drained: follow the swap
                None => continue,
                Some(()) if self.active_hold().is_some() => {
                    debug!("Token dropped during cooldown hold");
                    continue;
                }
                Some(()) => return Ok(()),
            }
        }
    }

    /// Swap in a ticker with `period`; affects only tokens issued from now on.
    pub fn replace(&self, period: Duration) {
        let fresh = Arc::new(Ticker::spawn(period, &self.cancel));
        let previous = match self.active.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, fresh),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), fresh),
        };
        previous.retire();
        info!(
            old_period = ?previous.period,
            new_period = ?period,
            "Rate limiter period replaced"
        );
    }

    /// Hold every future acquisition until `deadline`.
    ///
    /// Used to enforce a cooldown announced by the service across all
    /// workers. A later deadline is never shortened.
    pub fn hold_until(&self, deadline: Instant) {
        let mut hold = match self.hold_until.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if hold.map_or(true, |current| deadline > current) {
            *hold = Some(deadline);
            debug!(remaining = ?deadline.saturating_duration_since(Instant::now()), "Cooldown hold set");
        }
    }

    /// Deadline of the cooldown hold, if it has not passed yet.
    fn active_hold(&self) -> Option<Instant> {
        let deadline = match self.hold_until.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        deadline.filter(|deadline| *deadline > Instant::now())
    }

    async fn wait_for_hold(&self) -> Result<(), HandleCheckError> {
        if let Some(deadline) = self.active_hold() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(HandleCheckError::Cancelled),
                _ = sleep_until(deadline) => {}
            }
        }
        Ok(())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.current().retire();
    }
}

/// Period after a rate-limit hit on `attempt` (0-based): `base × 2^(attempt+1)`.
pub fn escalated_period(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_add(1).min(16);
    base.saturating_mul(1u32 << exponent)
}
