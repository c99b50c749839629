//! Output module for run reports and store statistics
//!
//! This module handles:
//! - Generating the markdown report of a run
//! - Printing run and store statistics to the console
//! - Writing JSON-lines exports of the store

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_run_summary, print_statistics};
pub use summary::{OutputError, OutputResult, RunSummary};

use crate::pipeline::RunStats;
use serde::Serialize;
use std::io::Write;

/// Builds the summary of a finished run
pub fn generate_summary(stats: &RunStats, config_hash: &str) -> RunSummary {
    RunSummary::new(stats, config_hash)
}

/// Writes each row as one JSON object per line
pub fn write_json_lines<W: Write, T: Serialize>(writer: &mut W, rows: &[T]) -> OutputResult<()> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| OutputError::Write(e.to_string()))?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_json_lines() {
        let mut row = BTreeMap::new();
        row.insert("entity_id", "acme");
        row.insert("emails", "sales@acme.test");

        let mut buffer = Vec::new();
        write_json_lines(&mut buffer, &[row.clone(), row]).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"emails":"sales@acme.test","entity_id":"acme"}"#);
    }
}
