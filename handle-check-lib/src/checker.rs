//! The remote-check seam.
//!
//! The worker pool never talks to the remote service directly; it calls a
//! [`Checker`]. Implementations return a classified [`Availability`] or an
//! error. A [`HandleCheckError::RateLimited`] error is the service's "slow
//! down" signal; every other error is treated as a transient failure.

use crate::error::HandleCheckError;
use crate::types::Availability;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

/// Performs one remote availability query.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use handle_check_lib::{Availability, Checker, HandleCheckError};
///
/// struct AlwaysTaken;
///
/// #[async_trait]
/// impl Checker for AlwaysTaken {
///     async fn check(&self, _identifier: &str) -> Result<Availability, HandleCheckError> {
///         Ok(Availability::Taken)
///     }
/// }
/// ```
#[async_trait]
pub trait Checker: Send + Sync {
    /// Query the service for `identifier`.
    async fn check(&self, identifier: &str) -> Result<Availability, HandleCheckError>;
}

#[async_trait]
impl<C: Checker + ?Sized> Checker for Arc<C> {
    async fn check(&self, identifier: &str) -> Result<Availability, HandleCheckError> {
        (**self).check(identifier).await
    }
}

lazy_static! {
    static ref FLOOD_WAIT: Regex = Regex::new(r"FLOOD_WAIT_?(\d*)").expect("valid regex");
}

/// Map a failure message from the remote service onto a classification.
///
/// Some answers that arrive as errors are really verdicts (`USERNAME_OCCUPIED`
/// means taken). Flood-wait messages become [`HandleCheckError::RateLimited`]
/// carrying the announced wait when it can be parsed. Anything else is a
/// remote error for `identifier`.
pub fn classify_failure(identifier: &str, message: &str) -> Result<Availability, HandleCheckError> {
    if message.contains("USERNAME_OCCUPIED") {
        return Ok(Availability::Taken);
    }
    if message.contains("USERNAME_PURCHASE_AVAILABLE") {
        return Ok(Availability::Purchasable);
    }
    if message.contains("USERNAME_INVALID") {
        return Ok(Availability::Invalid);
    }
    if message.contains("FLOOD_WAIT") {
        return Err(HandleCheckError::rate_limited(
            "remote",
            message.trim(),
            parse_flood_wait(message),
        ));
    }
    Err(HandleCheckError::remote(identifier, message.trim()))
}

/// Extract the wait from a message such as `FLOOD_WAIT_420`.
///
/// Returns None when the number is missing or zero.
pub fn parse_flood_wait(message: &str) -> Option<Duration> {
    FLOOD_WAIT
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_verdicts() {
        assert_eq!(
            classify_failure("alice", "rpc error code 400: USERNAME_OCCUPIED").unwrap(),
            Availability::Taken
        );
        assert_eq!(
            classify_failure("alice", "USERNAME_INVALID").unwrap(),
            Availability::Invalid
        );
        assert_eq!(
            classify_failure("alice", "USERNAME_PURCHASE_AVAILABLE").unwrap(),
            Availability::Purchasable
        );
    }

    #[test]
    fn test_classify_flood_wait() {
        let err = classify_failure("alice", "rpc error code 420: FLOOD_WAIT_30").unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

        // Unparsable wait leaves the choice of default to the caller
        let err = classify_failure("alice", "FLOOD_WAIT").unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_classify_unknown_is_remote_error() {
        let err = classify_failure("alice", "INTERNAL_SERVER_ERROR").unwrap_err();
        assert!(matches!(err, HandleCheckError::RemoteError { .. }));
    }

    #[test]
    fn test_parse_flood_wait() {
        assert_eq!(parse_flood_wait("FLOOD_WAIT_5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_flood_wait("FLOOD_WAIT_0"), None);
        assert_eq!(parse_flood_wait("FLOOD_WAIT_X"), None);
        assert_eq!(parse_flood_wait("nothing here"), None);
    }
}
