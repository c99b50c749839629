//! End-to-end runs of the staged pipeline against mock sites

use crate::common::{
    acme_target, create_test_config, forbid_other_requests, html_page, mount_not_found,
    mount_page, open_store, run_targets, run_with,
};
use lead_ripple::output::{generate_markdown_summary, generate_summary};
use lead_ripple::pipeline::{Orchestrator, RunOptions, Target};
use lead_ripple::state::TargetStatus;
use lead_ripple::storage::{EnrichmentRecord, EnrichmentStore, MergeMode, RunStatus};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

#[tokio::test]
async fn test_stage1_email_stops_escalation() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page("Acme", "<p>Write to contact@acme.test</p><a href=\"/about\">About</a>"),
        1,
    )
    .await;
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    let stats = run_targets(&config, vec![acme_target(&server)], &mut store).await;

    assert_eq!(stats.stage1.entered, 1);
    assert_eq!(stats.stage1.satisfied, 1);
    assert_eq!(stats.stage2.entered, 0);
    assert_eq!(stats.stage3.entered, 0);
    assert_eq!(stats.status_count(TargetStatus::Found), 1);

    let record = store.get("acme").unwrap().expect("record stored");
    assert_eq!(record.get("emails"), Some("contact@acme.test"));
    assert_eq!(record.field("emails").unwrap().source, "stage1");
    assert_eq!(record.get("email_source"), Some("stage1"));
    assert_eq!(record.get("title"), Some("Acme"));
}

#[tokio::test]
async fn test_stage2_fetches_prioritized_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page(
            "Acme",
            r#"<a href="/about">About</a> <a href="/privacy">Privacy</a> <a href="/contact">Contact</a>"#,
        ),
        1,
    )
    .await;
    mount_page(&server, "/contact", html_page("Contact", "Sales: sales@acme.test"), 1).await;
    mount_page(&server, "/about", html_page("About", "Family business since 1950"), 1).await;
    // Includes /privacy, which the prioritizer must drop
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    let stats = run_targets(&config, vec![acme_target(&server)], &mut store).await;

    assert_eq!(stats.stage1.satisfied, 0);
    assert_eq!(stats.stage2.entered, 1);
    assert_eq!(stats.stage2.satisfied, 1);
    assert_eq!(stats.stage3.entered, 0);

    let record = store.get("acme").unwrap().unwrap();
    assert_eq!(record.get("emails"), Some("sales@acme.test"));
    assert_eq!(record.field("emails").unwrap().source, "stage2");
    assert_eq!(record.get("pages_fetched"), Some("3"));
}

#[tokio::test]
async fn test_pattern_guess_replaced_by_later_verified_run() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    // First run: nothing on the site, so Stage 3 guesses
    let empty_site = MockServer::start().await;
    mount_page(&empty_site, "/", html_page("Acme", "<p>Welcome</p>"), 1).await;
    mount_not_found(&empty_site).await;

    let stats = run_targets(&config, vec![acme_target(&empty_site)], &mut store).await;
    assert_eq!(stats.stage3.entered, 1);
    assert_eq!(stats.status_count(TargetStatus::Guessed), 1);

    let guessed = store.get("acme").unwrap().unwrap();
    assert!(guessed.get("emails").unwrap().starts_with("info@acme.test; contact@acme.test"));
    assert!(guessed.field("emails").unwrap().is_pattern_guess());
    assert_eq!(guessed.get("email_confidence"), Some("unverified"));

    // Second run: the site now shows a real address
    let verified_site = MockServer::start().await;
    mount_page(&verified_site, "/", html_page("Acme", "sales@acme.test"), 1).await;
    forbid_other_requests(&verified_site).await;

    let stats = run_targets(&config, vec![acme_target(&verified_site)], &mut store).await;
    assert_eq!(stats.targets_skipped, 0);

    let verified = store.get("acme").unwrap().unwrap();
    assert_eq!(verified.get("emails"), Some("sales@acme.test"));
    assert_eq!(verified.get("primary_email"), Some("sales@acme.test"));
    assert_eq!(verified.get("email_confidence"), Some("verified"));
    assert!(verified.has_verified_email());

    // Third run: a fresh guess never displaces the verified address
    let empty_again = MockServer::start().await;
    mount_page(&empty_again, "/", html_page("Acme", "<p>Welcome</p>"), 1).await;
    mount_not_found(&empty_again).await;

    let options = RunOptions {
        fresh: true,
        ..RunOptions::default()
    };
    run_with(&config, vec![acme_target(&empty_again)], &mut store, options).await;

    let still_verified = store.get("acme").unwrap().unwrap();
    assert_eq!(still_verified.get("emails"), Some("sales@acme.test"));
}

#[tokio::test]
async fn test_unreachable_without_domain() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    // Nothing listens on the discard port
    let target = Target::new(Some("ghost"), "http://127.0.0.1:9/");
    let stats = run_targets(&config, vec![target], &mut store).await;

    assert_eq!(stats.status_count(TargetStatus::Unreachable), 1);
    assert_eq!(stats.stage2.entered, 0);
    assert_eq!(stats.stage3.entered, 0);
    assert_eq!(stats.fetches.get("network_error"), Some(&1));
    assert_eq!(stats.zero_signal_targets, vec!["ghost"]);

    let record = store.get("ghost").unwrap().expect("input fields still stored");
    assert_eq!(record.get("seed_url"), Some("http://127.0.0.1:9/"));
    assert!(record.get("emails").is_none());
}

#[tokio::test]
async fn test_unreachable_with_domain_goes_to_pattern_guess() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    let target = Target::new(Some("ghost"), "http://127.0.0.1:9/").with_domain("ghost.test");
    let stats = run_targets(&config, vec![target], &mut store).await;

    assert_eq!(stats.stage2.entered, 0);
    assert_eq!(stats.stage3.entered, 1);
    assert_eq!(stats.status_count(TargetStatus::Guessed), 1);

    let record = store.get("ghost").unwrap().unwrap();
    assert_eq!(record.get("primary_email"), Some("info@ghost.test"));
    assert!(record.field("emails").unwrap().is_pattern_guess());
}

#[tokio::test]
async fn test_render_required_site_skips_multi_page() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>App</title></head><body><div id="root"></div>
        <noscript>You need to enable JavaScript to run this app.</noscript>
        <script src="/static/js/main.js"></script></body></html>"#
            .to_string(),
        1,
    )
    .await;
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.enrichment.classify_sites = true;
    let mut store = open_store(&config);

    let stats = run_targets(&config, vec![acme_target(&server)], &mut store).await;

    assert_eq!(stats.render_required, 1);
    assert_eq!(stats.stage2.entered, 0);
    assert_eq!(stats.stage3.entered, 1);

    let record = store.get("acme").unwrap().unwrap();
    assert_eq!(record.get("render_required"), Some("true"));
    assert_eq!(record.get("site_method"), Some("render-required"));
    assert!(record.field("emails").unwrap().is_pattern_guess());
}

#[tokio::test]
async fn test_checkpoints_resume_and_report() {
    let server = MockServer::start().await;
    for name in ["one", "two", "three"] {
        mount_page(
            &server,
            &format!("/{}", name),
            html_page(name, &format!("{}@acme.test", name)),
            1,
        )
        .await;
    }
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);
    let targets = || -> Vec<Target> {
        ["one", "two", "three"]
            .iter()
            .map(|name| Target::new(Some(*name), &format!("{}/{}", server.uri(), name)))
            .collect()
    };

    let stats = run_targets(&config, targets(), &mut store).await;

    assert_eq!(stats.targets_processed, 3);
    assert_eq!(stats.checkpoints, 2);
    assert_eq!(stats.records_written, 3);
    assert_eq!(store.load(None).unwrap().len(), 3);
    assert_eq!(
        store.get("two").unwrap().unwrap().get("emails"),
        Some("two@acme.test")
    );

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.stats_json.unwrap().contains("\"checkpoints\":2"));

    let summary = generate_summary(&stats, "hash");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path)).unwrap();
    let report = std::fs::read_to_string(&config.output.summary_path).unwrap();
    assert!(report.contains("| 1 - Homepage | 3 | 3 |"));

    // Resume: every target already has a verified email, no request is made
    let stats = run_targets(&config, targets(), &mut store).await;
    assert_eq!(stats.targets_skipped, 3);
    assert_eq!(stats.targets_processed, 0);
}

#[tokio::test]
async fn test_cancelled_run_persists_nothing() {
    let server = MockServer::start().await;
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(&config, cancel.clone()).unwrap();
    cancel.cancel();

    let targets = vec![
        acme_target(&server),
        Target::new(Some("beta"), &format!("{}/beta", server.uri())),
    ];
    let stats = orchestrator
        .run(targets, &mut store, &RunOptions::default())
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.targets_cancelled, 2);
    assert_eq!(stats.targets_processed, 0);
    assert!(store.load(None).unwrap().is_empty());
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
}

#[tokio::test]
async fn test_overwrite_mode_replaces_verified_values() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);
    store
        .upsert(
            &[EnrichmentRecord::new("acme").with_field("emails", "old@acme.test", "stage1")],
            MergeMode::FillMissing,
        )
        .unwrap();

    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Acme", "new@acme.test"), 2).await;
    forbid_other_requests(&server).await;

    let fill = RunOptions {
        fresh: true,
        ..RunOptions::default()
    };
    run_with(&config, vec![acme_target(&server)], &mut store, fill).await;
    assert_eq!(store.get("acme").unwrap().unwrap().get("emails"), Some("old@acme.test"));

    let overwrite = RunOptions {
        fresh: true,
        merge_mode: MergeMode::Overwrite,
        ..RunOptions::default()
    };
    run_with(&config, vec![acme_target(&server)], &mut store, overwrite).await;
    assert_eq!(store.get("acme").unwrap().unwrap().get("emails"), Some("new@acme.test"));
}
