//! Console statistics
//!
//! This module prints the store statistics behind `--stats` and the short
//! run report shown when a run ends.

use crate::output::summary::RunSummary;
use crate::storage::{EnrichmentStore, StoreStats};
use crate::Result;

/// Loads statistics from the store
pub fn load_statistics(store: &dyn EnrichmentStore) -> Result<StoreStats> {
    Ok(store.store_stats()?)
}

/// Prints store statistics to stdout
pub fn print_statistics(stats: &StoreStats) {
    println!("=== Enrichment Store Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.total_records);
    println!(
        "  With verified email: {} ({:.1}%)",
        stats.verified_emails,
        percentage(stats.verified_emails, stats.total_records)
    );
    println!(
        "  With pattern-guessed email only: {} ({:.1}%)",
        stats.pattern_guesses,
        percentage(stats.pattern_guesses, stats.total_records)
    );
    println!("  Runs: {}", stats.total_runs);
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  ID: {}", run.id);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status.to_db_string());
        println!("  Config hash: {}", run.config_hash);
        println!();
    }
}

/// Prints the end-of-run report to stdout
pub fn print_run_summary(summary: &RunSummary) {
    let stats = &summary.stats;

    println!("=== Enrichment Run Summary ===\n");
    if let Some(run_id) = summary.run_id {
        println!("Run {} ({})", run_id, summary.status);
    }
    println!(
        "  Targets: {} total, {} processed, {} skipped, {} cancelled",
        stats.targets_total, stats.targets_processed, stats.targets_skipped, stats.targets_cancelled
    );
    println!();

    println!("Stages (entered / satisfied):");
    println!("  Stage 1 homepage:      {} / {}", stats.stage1.entered, stats.stage1.satisfied);
    println!("  Stage 2 multi-page:    {} / {}", stats.stage2.entered, stats.stage2.satisfied);
    println!("  Stage 3 pattern guess: {} / {}", stats.stage3.entered, stats.stage3.satisfied);
    println!();

    if !stats.fetches.is_empty() {
        println!("Fetches:");
        for (status, count) in &stats.fetches {
            println!("  {}: {}", status, count);
        }
        println!("  retries: {}", stats.fetch_retries);
        println!();
    }

    println!(
        "Found Rate: {:.1}% ({} targets without signal)",
        summary.found_rate(),
        stats.zero_signal_targets.len()
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EnrichmentRecord, MergeMode, SqliteStore};

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert!((percentage(1, 4) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_statistics() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .upsert(
                &[
                    EnrichmentRecord::new("a").with_field("emails", "a@acme.test", "stage1"),
                    EnrichmentRecord::new("b").with_field("emails", "info@b.test", "pattern_guess"),
                ],
                MergeMode::FillMissing,
            )
            .unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.verified_emails, 1);
        assert_eq!(stats.pattern_guesses, 1);
    }
}
