//! Run summary types
//!
//! This module defines the data structure behind the end-of-run report and
//! the output error type.

use crate::pipeline::RunStats;
use crate::state::TargetStatus;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary of one enrichment run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Option<i64>,
    pub status: String,
    pub config_hash: String,
    pub duration_seconds: Option<u64>,
    pub stats: RunStats,
}

impl RunSummary {
    pub fn new(stats: &RunStats, config_hash: &str) -> Self {
        let duration_seconds = match (stats.started_at, stats.finished_at) {
            (Some(started), Some(finished)) => {
                Some((finished - started).num_seconds().max(0) as u64)
            }
            _ => None,
        };

        let status = if stats.cancelled {
            "interrupted"
        } else {
            "completed"
        };

        Self {
            run_id: stats.run_id,
            status: status.to_string(),
            config_hash: config_hash.to_string(),
            duration_seconds,
            stats: stats.clone(),
        }
    }

    /// Share of processed targets where the required signal was found
    pub fn found_rate(&self) -> f64 {
        self.rate(self.stats.status_count(TargetStatus::Found))
    }

    /// Share of processed targets left without any signal
    pub fn zero_signal_rate(&self) -> f64 {
        self.rate(self.stats.zero_signal_targets.len() as u64)
    }

    fn rate(&self, count: u64) -> f64 {
        if self.stats.targets_processed == 0 {
            return 0.0;
        }
        (count as f64 / self.stats.targets_processed as f64) * 100.0
    }
}
