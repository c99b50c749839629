//! Crawler module for fetching target websites
//!
//! This module contains the network-facing half of the enrichment engine:
//! - HTTP fetching with retry logic and typed failures
//! - The token bucket rate limiter every fetch passes through
//! - Site classification from the homepage probe
//! - Link prioritization for the multi-page stage

mod classifier;
mod fetcher;
mod prioritizer;
mod rate_limiter;

pub use classifier::{classify_attempt, FetchMethod, SiteClassification};
pub use fetcher::{build_http_client, FetchAttempt, FetchStatus, Fetcher, RetryPolicy};
pub use prioritizer::{prioritize, score_link, FALLBACK_PATHS};
pub use rate_limiter::RateLimiter;

use std::time::Duration;
use url::Url;

/// Probes a site with one homepage fetch and classifies it
///
/// The returned attempt is the Stage 1 homepage fetch; callers extract
/// signals from it rather than fetching the homepage again.
pub async fn classify(
    fetcher: &Fetcher,
    seed_url: &Url,
    timeout: Duration,
) -> (FetchAttempt, SiteClassification) {
    let attempt = fetcher.fetch(seed_url.as_str(), 1, timeout).await;
    let classification = classify_attempt(&attempt);

    tracing::debug!(
        url = %seed_url,
        method = %classification.method,
        confidence = classification.confidence,
        quality = classification.content_quality,
        js_risk = classification.js_risk,
        "Classified site"
    );

    (attempt, classification)
}
