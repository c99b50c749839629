use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Lead-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub denylist: Vec<DomainEntry>,
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetEntry>,
}

/// Enrichment engine behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EnrichmentConfig {
    /// Sustained outbound request rate (tokens per second)
    pub rate_limit_per_second: f64,

    /// Token bucket burst size; defaults to the rate when absent
    pub burst_capacity: Option<f64>,

    /// Maximum number of in-flight fetches and concurrently driven targets
    pub worker_pool_size: usize,

    /// Maximum concurrent Stage 2 fetches for a single target
    pub per_target_concurrency: usize,

    /// Timeout for the homepage fetch
    pub stage1_timeout_seconds: u64,

    /// Timeout for each multi-page fetch
    pub stage2_timeout_seconds: u64,

    /// Pages fetched per target in Stage 2, homepage included
    pub max_pages_per_target: usize,

    /// Cap on links kept per fetched page
    pub max_links_per_page: usize,

    /// Extra attempts after a timeout or network error
    pub retry_attempts: u32,

    /// Backoff before the first retry, doubled on each further retry
    pub retry_backoff_ms: u64,

    /// Targets per batch; records are persisted after every batch
    pub checkpoint_every: usize,

    /// Stops issuing new fetches after this many seconds
    pub run_timeout_seconds: Option<u64>,

    /// Condition that ends escalation for a target
    pub required_signal: RequiredSignal,

    /// Lets incoming values replace existing non-empty fields
    pub overwrite_mode: bool,

    /// Runs the site classifier on the homepage probe
    pub classify_sites: bool,

    /// Skips TLS certificate validation (coverage over trust)
    pub accept_invalid_certs: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_second: 10.0,
            burst_capacity: None,
            worker_pool_size: 50,
            per_target_concurrency: 5,
            stage1_timeout_seconds: 10,
            stage2_timeout_seconds: 20,
            max_pages_per_target: 5,
            max_links_per_page: 50,
            retry_attempts: 2,
            retry_backoff_ms: 500,
            checkpoint_every: 50,
            run_timeout_seconds: None,
            required_signal: RequiredSignal::Email,
            overwrite_mode: false,
            classify_sites: true,
            accept_invalid_certs: false,
        }
    }
}

impl EnrichmentConfig {
    /// Burst capacity with the rate as fallback
    pub fn capacity(&self) -> f64 {
        self.burst_capacity.unwrap_or(self.rate_limit_per_second)
    }

    pub fn stage1_timeout(&self) -> Duration {
        Duration::from_secs(self.stage1_timeout_seconds)
    }

    pub fn stage2_timeout(&self) -> Duration {
        Duration::from_secs(self.stage2_timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// The signal whose presence stops escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredSignal {
    /// At least one valid email
    Email,
    /// At least one valid email on the target's own domain
    DomainEmail,
    /// A valid email or any social profile link
    EmailOrSocial,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite enrichment store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown run report
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// Simple domain entry for the denylist
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}

/// A target declared inline in the configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetEntry {
    pub entity_id: Option<String>,
    pub seed_url: String,
    pub display_name: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}
