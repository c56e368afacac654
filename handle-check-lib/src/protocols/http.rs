//! HTTP endpoint checker.
//!
//! Probes a profile-style URL for each identifier and maps the response onto
//! an [`Availability`]. The endpoint is a template containing `{username}`,
//! e.g. `https://example.org/api/users/{username}`.

use crate::checker::{classify_failure, Checker};
use crate::error::HandleCheckError;
use crate::types::Availability;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Placeholder replaced with the identifier in endpoint templates.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Checker backed by a plain HTTP GET per identifier.
#[derive(Clone)]
pub struct HttpChecker {
    /// HTTP client for making profile requests
    http_client: reqwest::Client,
    /// Endpoint template containing `{username}`
    endpoint: String,
    /// Timeout for a single request
    timeout: Duration,
}

impl HttpChecker {
    /// Create a checker for `endpoint` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the template lacks `{username}` and
    /// `NetworkError` if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, HandleCheckError> {
        let endpoint = endpoint.into();
        if !endpoint.contains(USERNAME_PLACEHOLDER) {
            return Err(HandleCheckError::config(format!(
                "Endpoint '{}' must contain {}",
                endpoint, USERNAME_PLACEHOLDER
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(2)) // Add buffer for HTTP timeout
            .user_agent(concat!("handle-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                HandleCheckError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            endpoint,
            timeout,
        })
    }

    /// URL requested for `identifier`.
    pub fn url_for(&self, identifier: &str) -> String {
        self.endpoint.replace(USERNAME_PLACEHOLDER, identifier)
    }

    async fn request(&self, identifier: &str) -> Result<Availability, HandleCheckError> {
        let url = self.url_for(identifier);
        debug!(%url, "Probing endpoint");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();

        classify_response(identifier, status, &headers, &body)
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn check(&self, identifier: &str) -> Result<Availability, HandleCheckError> {
        match tokio::time::timeout(self.timeout, self.request(identifier)).await {
            Ok(result) => result,
            Err(_) => Err(HandleCheckError::timeout("HTTP request", self.timeout)),
        }
    }
}

/// Map an HTTP answer onto a classification.
///
/// - 404: nobody holds the identifier
/// - 2xx: taken
/// - 429: rate limited, honouring a numeric `Retry-After`
/// - 5xx: retryable remote error
/// - anything else: the body goes through [`classify_failure`]
pub fn classify_response(
    identifier: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Result<Availability, HandleCheckError> {
    match status {
        StatusCode::NOT_FOUND => Ok(Availability::Available),
        s if s.is_success() => Ok(Availability::Taken),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(HandleCheckError::rate_limited(
                "http endpoint",
                format!("HTTP {}", status.as_u16()),
                retry_after,
            ))
        }
        s if s.is_server_error() => Err(HandleCheckError::remote_with_status(
            identifier,
            format!("Server error: {}", s),
            s.as_u16(),
        )),
        s => classify_failure(identifier, body).map_err(|e| match e {
            HandleCheckError::RemoteError { message, .. } => {
                HandleCheckError::remote_with_status(identifier, message, s.as_u16())
            }
            other => other,
        }),
    }
}
