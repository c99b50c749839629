//! Store behavior as seen through complete enrichment runs

use crate::common::{
    create_test_config, forbid_other_requests, html_page, mount_not_found, mount_page,
    open_store, run_targets, run_with,
};
use lead_ripple::pipeline::{RunOptions, Target};
use lead_ripple::storage::{EnrichmentStore, Filter};
use tempfile::TempDir;
use wiremock::MockServer;

/// One target with a published address, one the pipeline can only guess for
async fn mixed_site() -> (MockServer, Vec<Target>) {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/found",
        html_page("Acme", "<p>Reach us at sales@acme.test</p>"),
        1,
    )
    .await;
    mount_page(&server, "/empty", html_page("Beta", "<p>Coming soon</p>"), 1).await;
    mount_not_found(&server).await;

    let targets = vec![
        Target::new(Some("found"), &format!("{}/found", server.uri())).with_domain("acme.test"),
        Target::new(Some("guessed"), &format!("{}/empty", server.uri()))
            .with_domain("beta.test")
            .with_metadata("city", "Springfield"),
    ];
    (server, targets)
}

#[tokio::test]
async fn test_replayed_run_leaves_store_unchanged() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Acme", "contact@acme.test"), 2).await;
    forbid_other_requests(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);
    let target = Target::new(Some("acme"), &format!("{}/", server.uri())).with_domain("acme.test");
    let fresh = RunOptions {
        fresh: true,
        ..RunOptions::default()
    };

    run_with(&config, vec![target.clone()], &mut store, fresh.clone()).await;
    let first = store.load(None).unwrap();

    run_with(&config, vec![target], &mut store, fresh).await;
    assert_eq!(store.load(None).unwrap(), first);
}

#[tokio::test]
async fn test_summary_inputs_hide_guesses() {
    let (_server, targets) = mixed_site().await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);
    run_targets(&config, targets, &mut store).await;

    let inputs = store.summary_inputs(&[]).unwrap();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].entity_id, "found");
    assert_eq!(inputs[0].emails, vec!["sales@acme.test"]);
    assert_eq!(inputs[1].entity_id, "guessed");
    assert!(inputs[1].emails.is_empty());
    assert_eq!(inputs[1].metadata.get("city").map(String::as_str), Some("Springfield"));

    // The guesses are still in the store itself
    let guessed = store.get("guessed").unwrap().unwrap();
    assert_eq!(guessed.get("primary_email"), Some("info@beta.test"));
}

#[tokio::test]
async fn test_export_filters_and_columns_after_run() {
    let (_server, targets) = mixed_site().await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mut store = open_store(&config);
    run_targets(&config, targets, &mut store).await;

    let with_email = store.export(&[Filter::present("emails")], None).unwrap();
    assert_eq!(with_email.len(), 2);

    let verified_only = vec!["email_confidence=verified".parse::<Filter>().unwrap()];
    let columns = vec!["primary_email".to_string(), "title".to_string()];
    let rows = store.export(&verified_only, Some(&columns)).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["entity_id"], "found");
    assert_eq!(rows[0]["primary_email"], "sales@acme.test");
    assert_eq!(rows[0]["title"], "Acme");
    assert_eq!(rows[0].len(), 3);
}

#[tokio::test]
async fn test_store_persists_across_reopen() {
    let (_server, targets) = mixed_site().await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    {
        let mut store = open_store(&config);
        run_targets(&config, targets, &mut store).await;
    }

    let store = open_store(&config);
    assert_eq!(store.verified_email_ids().unwrap(), vec!["found"]);

    let stats = store.store_stats().unwrap();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.verified_emails, 1);
    assert_eq!(stats.pattern_guesses, 1);
    assert_eq!(stats.total_runs, 1);
}
