//! Markdown run report generation
//!
//! This module generates the human-readable report written at the end of
//! every run: per-stage counts, fetch outcomes and the targets that need a
//! manual look.

use crate::output::summary::{OutputResult, RunSummary};
use crate::state::TargetStatus;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Zero-signal targets listed before the report truncates
const ZERO_SIGNAL_LIMIT: usize = 200;

/// Writes the markdown report for a run
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let stats = &summary.stats;
    let mut md = String::new();

    // Title
    md.push_str("# Lead-Ripple Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    if let Some(started) = stats.started_at {
        md.push_str(&format!("- **Started**: {}\n", started.to_rfc3339()));
    }
    if let Some(finished) = stats.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Targets**: {}\n", stats.targets_total));
    md.push_str(&format!("- **Processed**: {}\n", stats.targets_processed));
    md.push_str(&format!(
        "- **Skipped (already enriched)**: {}\n",
        stats.targets_skipped
    ));
    if stats.duplicate_targets > 0 {
        md.push_str(&format!(
            "- **Duplicate targets ignored**: {}\n",
            stats.duplicate_targets
        ));
    }
    md.push_str(&format!("- **Cancelled**: {}\n", stats.targets_cancelled));
    md.push_str(&format!("- **Records written**: {}\n", stats.records_written));
    md.push_str(&format!("- **Checkpoints**: {}\n", stats.checkpoints));
    md.push_str(&format!("- **Found Rate**: {:.2}%\n", summary.found_rate()));
    md.push_str(&format!(
        "- **Zero-Signal Rate**: {:.2}%\n\n",
        summary.zero_signal_rate()
    ));

    // Stage breakdown
    md.push_str("## Stage Breakdown\n\n");
    md.push_str("| Stage | Entered | Satisfied |\n");
    md.push_str("|-------|---------|-----------|\n");
    md.push_str(&format!(
        "| 1 - Homepage | {} | {} |\n",
        stats.stage1.entered, stats.stage1.satisfied
    ));
    md.push_str(&format!(
        "| 2 - Multi-page | {} | {} |\n",
        stats.stage2.entered, stats.stage2.satisfied
    ));
    md.push_str(&format!(
        "| 3 - Pattern guess | {} | {} |\n\n",
        stats.stage3.entered, stats.stage3.satisfied
    ));

    // Final statuses
    md.push_str("## Target Outcomes\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    for status in TargetStatus::all_statuses() {
        if status == TargetStatus::Cancelled {
            continue;
        }
        md.push_str(&format!(
            "| {} | {} |\n",
            status.to_db_string(),
            stats.status_count(status)
        ));
    }
    md.push_str(&format!(
        "| render_required (flagged) | {} |\n\n",
        stats.render_required
    ));

    // Fetches
    if !stats.fetches.is_empty() {
        md.push_str("## Fetches\n\n");
        md.push_str("| Outcome | Count |\n");
        md.push_str("|---------|-------|\n");
        for (status, count) in &stats.fetches {
            md.push_str(&format!("| {} | {} |\n", status, count));
        }
        md.push_str(&format!("| **total** | {} |\n\n", stats.total_fetches()));
        md.push_str(&format!("Retries: {}\n\n", stats.fetch_retries));
    }

    // Targets without any signal
    if !stats.zero_signal_targets.is_empty() {
        md.push_str("## Targets Without Signal\n\n");
        md.push_str(&format!(
            "Total: {}\n\n",
            stats.zero_signal_targets.len()
        ));
        for entity_id in stats.zero_signal_targets.iter().take(ZERO_SIGNAL_LIMIT) {
            md.push_str(&format!("- {}\n", entity_id));
        }
        if stats.zero_signal_targets.len() > ZERO_SIGNAL_LIMIT {
            md.push_str(&format!(
                "\n... and {} more\n",
                stats.zero_signal_targets.len() - ZERO_SIGNAL_LIMIT
            ));
        }
        md.push('\n');
    }

    md
}
