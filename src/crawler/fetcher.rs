//! HTTP fetcher implementation
//!
//! This module handles every outbound request of the enrichment engine:
//! - Building the shared HTTP client with the configured user agent
//! - Gating each request on the global worker pool and the rate limiter
//! - Retrying timeouts and network errors with exponential backoff
//! - Classifying failures into a typed `FetchStatus`
//!
//! A fetch never returns an error to the caller; every outcome is a
//! `FetchAttempt`.

use crate::config::{Config, UserAgentConfig};
use crate::crawler::rate_limiter::RateLimiter;
use chrono::{DateTime, Utc};
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Outcome class of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// 2xx response with a readable body
    Success,
    /// Non-2xx response; the body is kept when present
    HttpError,
    /// No response within the timeout
    Timeout,
    /// DNS, connection, TLS or body read failure
    NetworkError,
    /// The run was cancelled before the request was issued
    Cancelled,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::HttpError => "http_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Timeouts and network errors are worth another attempt, HTTP errors are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError)
    }

    /// True when the remote host never answered
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One HTTP fetch and its outcome
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// Requested URL
    pub url: String,
    /// URL after redirects, when a response arrived
    pub final_url: Option<String>,
    /// Pipeline stage that issued the fetch (1, 2, or 3)
    pub stage: u8,
    pub status: FetchStatus,
    pub http_status_code: Option<u16>,
    /// Response body; dropped once signals are extracted
    pub raw_body: Option<String>,
    pub error: Option<String>,
    /// Requests issued, retries included
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
}

impl FetchAttempt {
    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Body of the response, if one was read
    pub fn body(&self) -> Option<&str> {
        self.raw_body.as_deref()
    }

    /// URL to resolve relative links against
    pub fn base_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }

    fn failed(url: &str, stage: u8, status: FetchStatus, error: String) -> Self {
        Self {
            url: url.to_string(),
            final_url: None,
            stage,
            status,
            http_status_code: None,
            raw_body: None,
            error: Some(error),
            attempts: 0,
            fetched_at: Utc::now(),
        }
    }
}

/// Retry policy for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub retry_attempts: u32,
    /// Wait before the first retry; doubled for each later one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed (up to 10 hops). `accept_invalid_certs` trades TLS
/// trust for coverage of small-business sites with broken certificates.
///
/// # Example
///
/// ```no_run
/// use lead_ripple::config::UserAgentConfig;
/// use lead_ripple::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "LeadRipple".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, false).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    accept_invalid_certs: bool,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Shared, stateless-per-call fetcher
///
/// Holds the HTTP client, the global in-flight cap, the rate limiter and the
/// run's cancellation token. Cheap to share behind an `Arc`.
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        worker_pool_size: usize,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            limiter,
            permits: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            retry,
            cancel,
        }
    }

    /// Builds a fetcher from the run configuration
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, reqwest::Error> {
        let enrichment = &config.enrichment;
        let client = build_http_client(&config.user_agent, enrichment.accept_invalid_certs)?;
        let limiter = Arc::new(RateLimiter::new(
            enrichment.rate_limit_per_second,
            enrichment.capacity(),
        ));
        let retry = RetryPolicy {
            retry_attempts: enrichment.retry_attempts,
            backoff: enrichment.retry_backoff(),
        };

        Ok(Self::new(
            client,
            limiter,
            enrichment.worker_pool_size,
            retry,
            cancel,
        ))
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetches a URL with retry on transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Success |
    /// | Other status | HttpError, body kept, no retry |
    /// | Timeout | Retry with backoff, then Timeout |
    /// | Connection/DNS/TLS failure | Retry with backoff, then NetworkError |
    /// | Run cancelled | Cancelled, no request issued |
    pub async fn fetch(&self, url: &str, stage: u8, timeout: Duration) -> FetchAttempt {
        let max_attempts = self.retry.retry_attempts + 1;
        let mut backoff = self.retry.backoff;
        let mut attempts = 0;

        loop {
            if self.cancel.is_cancelled() {
                let mut attempt = FetchAttempt::failed(
                    url,
                    stage,
                    FetchStatus::Cancelled,
                    "run cancelled".to_string(),
                );
                attempt.attempts = attempts;
                return attempt;
            }

            attempts += 1;
            let mut attempt = self.fetch_once(url, stage, timeout).await;
            attempt.attempts = attempts;

            if !attempt.status.is_retryable() || attempts >= max_attempts {
                tracing::debug!(
                    url = %url,
                    stage,
                    status = %attempt.status,
                    attempts,
                    "Fetch finished"
                );
                return attempt;
            }

            tracing::warn!(
                "Fetch of {} failed ({}), retrying in {:?} (attempt {}/{})",
                url,
                attempt.error.as_deref().unwrap_or(attempt.status.as_str()),
                backoff,
                attempts,
                max_attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = self.cancel.cancelled() => {}
            }
            backoff = backoff.saturating_mul(2);
        }
    }

    /// Issues a single request once a pool permit and a rate token are held
    ///
    /// Waiting for either gives up as soon as the run is cancelled.
    async fn fetch_once(&self, url: &str, stage: u8, timeout: Duration) -> FetchAttempt {
        let cancelled = || {
            FetchAttempt::failed(url, stage, FetchStatus::Cancelled, "run cancelled".to_string())
        };

        let _permit = tokio::select! {
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    return FetchAttempt::failed(
                        url,
                        stage,
                        FetchStatus::Cancelled,
                        "worker pool closed".to_string(),
                    )
                }
            },
            _ = self.cancel.cancelled() => return cancelled(),
        };

        // A dropped acquire consumes no token
        tokio::select! {
            _ = self.limiter.acquire() => {}
            _ = self.cancel.cancelled() => return cancelled(),
        }

        if self.cancel.is_cancelled() {
            return cancelled();
        }

        let fetched_at = Utc::now();
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(url, stage, &e),
        };

        let status = response.status();
        let final_url = response.url().to_string();

        match response.text().await {
            Ok(body) => FetchAttempt {
                url: url.to_string(),
                final_url: Some(final_url),
                stage,
                status: if status.is_success() {
                    FetchStatus::Success
                } else {
                    FetchStatus::HttpError
                },
                http_status_code: Some(status.as_u16()),
                raw_body: Some(body).filter(|b| !b.is_empty()),
                error: (!status.is_success()).then(|| format!("HTTP {}", status.as_u16())),
                attempts: 0,
                fetched_at,
            },
            Err(e) if !status.is_success() => FetchAttempt {
                url: url.to_string(),
                final_url: Some(final_url),
                stage,
                status: FetchStatus::HttpError,
                http_status_code: Some(status.as_u16()),
                raw_body: None,
                error: Some(format!("HTTP {} ({})", status.as_u16(), e)),
                attempts: 0,
                fetched_at,
            },
            Err(e) => {
                let mut attempt = classify_error(url, stage, &e);
                attempt.final_url = Some(final_url);
                attempt.http_status_code = Some(status.as_u16());
                attempt
            }
        }
    }
}

/// Maps a transport error onto a fetch status
fn classify_error(url: &str, stage: u8, error: &reqwest::Error) -> FetchAttempt {
    if error.is_timeout() {
        FetchAttempt::failed(
            url,
            stage,
            FetchStatus::Timeout,
            "Request timeout".to_string(),
        )
    } else if error.is_connect() {
        FetchAttempt::failed(
            url,
            stage,
            FetchStatus::NetworkError,
            format!("Connection failed: {}", error),
        )
    } else {
        FetchAttempt::failed(url, stage, FetchStatus::NetworkError, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestEnricher".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn test_fetcher(retry_attempts: u32, cancel: CancellationToken) -> Fetcher {
        let client = build_http_client(&create_test_config(), false).unwrap();
        Fetcher::new(
            client,
            Arc::new(RateLimiter::per_second(100.0)),
            4,
            RetryPolicy {
                retry_attempts,
                backoff: Duration::from_millis(10),
            },
            cancel,
        )
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config(), false).is_ok());
        assert!(build_http_client(&create_test_config(), true).is_ok());
    }

    #[test]
    fn test_status_classes() {
        assert!(FetchStatus::Timeout.is_retryable());
        assert!(FetchStatus::NetworkError.is_retryable());
        assert!(!FetchStatus::HttpError.is_retryable());
        assert!(!FetchStatus::Success.is_retryable());
        assert!(!FetchStatus::Cancelled.is_unreachable());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2, CancellationToken::new());
        let attempt = fetcher
            .fetch(&format!("{}/", server.uri()), 1, Duration::from_secs(5))
            .await;

        assert_eq!(attempt.status, FetchStatus::Success);
        assert_eq!(attempt.http_status_code, Some(200));
        assert_eq!(attempt.body(), Some("<html>hello</html>"));
        assert_eq!(attempt.stage, 1);
        assert_eq!(attempt.attempts, 1);
    }

    #[tokio::test]
    async fn test_http_error_keeps_body_and_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2, CancellationToken::new());
        let attempt = fetcher
            .fetch(&format!("{}/missing", server.uri()), 2, Duration::from_secs(5))
            .await;

        assert_eq!(attempt.status, FetchStatus::HttpError);
        assert_eq!(attempt.http_status_code, Some(404));
        assert_eq!(attempt.body(), Some("not here"));
        assert_eq!(attempt.attempts, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(1, CancellationToken::new());
        let attempt = fetcher
            .fetch(&format!("{}/slow", server.uri()), 1, Duration::from_millis(200))
            .await;

        assert_eq!(attempt.status, FetchStatus::Timeout);
        assert_eq!(attempt.attempts, 2);
        assert!(attempt.raw_body.is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let fetcher = test_fetcher(1, CancellationToken::new());
        // Port 9 (discard) is closed on test machines
        let attempt = fetcher
            .fetch("http://127.0.0.1:9/", 1, Duration::from_secs(2))
            .await;

        assert!(attempt.status.is_unreachable());
        assert_eq!(attempt.attempts, 2);
    }

    #[tokio::test]
    async fn test_cancel_releases_fetches_waiting_for_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let client = build_http_client(&create_test_config(), false).unwrap();
        let fetcher = Arc::new(Fetcher::new(
            client,
            Arc::new(RateLimiter::new(1.0, 1.0)),
            4,
            RetryPolicy {
                retry_attempts: 0,
                backoff: Duration::from_millis(10),
            },
            cancel.clone(),
        ));

        let mut handles = Vec::new();
        for i in 0..6 {
            let fetcher = Arc::clone(&fetcher);
            let url = format!("{}/page{}", server.uri(), i);
            handles.push(tokio::spawn(async move {
                fetcher.fetch(&url, 2, Duration::from_secs(5)).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        let cancelled_at = std::time::Instant::now();
        cancel.cancel();

        let mut cancelled = 0;
        for handle in handles {
            if handle.await.unwrap().status == FetchStatus::Cancelled {
                cancelled += 1;
            }
        }

        // One token up front; everyone else was still queued
        assert_eq!(cancelled, 5);
        assert!(
            cancelled_at.elapsed() < Duration::from_millis(500),
            "queued fetches drained slowly: {:?}",
            cancelled_at.elapsed()
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetcher = test_fetcher(2, cancel);
        let attempt = fetcher
            .fetch(&format!("{}/", server.uri()), 1, Duration::from_secs(5))
            .await;

        assert_eq!(attempt.status, FetchStatus::Cancelled);
        assert_eq!(attempt.attempts, 0);
    }
}
