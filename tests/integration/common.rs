//! Shared fixtures for the integration tests

use lead_ripple::config::{Config, EnrichmentConfig, OutputConfig, UserAgentConfig};
use lead_ripple::pipeline::{Orchestrator, RunOptions, RunStats, Target};
use lead_ripple::storage::SqliteStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
///
/// Classification is off unless a test turns it on, retries are disabled and
/// the rate limit is high enough not to slow anything down.
pub fn create_test_config(dir: &TempDir) -> Config {
    Config {
        enrichment: EnrichmentConfig {
            rate_limit_per_second: 1000.0,
            worker_pool_size: 8,
            per_target_concurrency: 2,
            stage1_timeout_seconds: 5,
            stage2_timeout_seconds: 5,
            retry_attempts: 0,
            retry_backoff_ms: 10,
            checkpoint_every: 2,
            classify_sites: false,
            ..EnrichmentConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.path().join("leads.db").display().to_string(),
            summary_path: dir.path().join("summary.md").display().to_string(),
        },
        denylist: vec![],
        targets: vec![],
    }
}

/// The `acme` target served by `server`, with its real domain supplied
pub fn acme_target(server: &MockServer) -> Target {
    Target::new(Some("acme"), &format!("{}/", server.uri())).with_domain("acme.test")
}

/// Wraps a body fragment into a small HTML page
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, body
    )
}

/// Serves `body` as HTML at `page`, expecting exactly `times` requests
pub async fn mount_page(server: &MockServer, page: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Answers every other request with 404; mount after the specific pages
pub async fn mount_not_found(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Fails the test if any unmatched request arrives; mount after the specific pages
pub async fn forbid_other_requests(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(server)
        .await;
}

/// Runs `targets` with default options and returns the stats
pub async fn run_targets(config: &Config, targets: Vec<Target>, store: &mut SqliteStore) -> RunStats {
    run_with(config, targets, store, RunOptions::default()).await
}

pub async fn run_with(
    config: &Config,
    targets: Vec<Target>,
    store: &mut SqliteStore,
    options: RunOptions,
) -> RunStats {
    let orchestrator =
        Orchestrator::new(config, CancellationToken::new()).expect("Failed to build orchestrator");
    orchestrator
        .run(targets, store, &options)
        .await
        .expect("Run failed")
}

pub fn open_store(config: &Config) -> SqliteStore {
    SqliteStore::new(std::path::Path::new(&config.output.database_path))
        .expect("Failed to open store")
}
