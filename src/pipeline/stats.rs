//! Run-scoped statistics

use crate::pipeline::TargetOutcome;
use crate::state::{TargetState, TargetStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Entered/satisfied counts for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub entered: u64,
    pub satisfied: u64,
}

/// Statistics for one run
///
/// Owned by the orchestrator for the duration of a run and returned at the
/// end; nothing here outlives the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub run_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub targets_total: u64,
    pub targets_processed: u64,
    /// Skipped on resume because the store already has a verified email
    pub targets_skipped: u64,
    pub targets_cancelled: u64,
    pub duplicate_targets: u64,
    pub stage1: StageCounts,
    pub stage2: StageCounts,
    pub stage3: StageCounts,
    /// Final status of every processed target
    pub statuses: BTreeMap<String, u64>,
    /// Fetches by outcome
    pub fetches: BTreeMap<String, u64>,
    /// Extra attempts spent on timeouts and network errors
    pub fetch_retries: u64,
    pub render_required: u64,
    pub records_written: u64,
    pub checkpoints: u64,
    /// Targets that ended without a verified email or social link
    pub zero_signal_targets: Vec<String>,
    pub cancelled: bool,
}

impl RunStats {
    pub fn stage(&self, state: TargetState) -> Option<&StageCounts> {
        match state {
            TargetState::Stage1Homepage => Some(&self.stage1),
            TargetState::Stage2MultiPage => Some(&self.stage2),
            TargetState::Stage3PatternGuess => Some(&self.stage3),
            TargetState::NotStarted | TargetState::Done => None,
        }
    }

    fn stage_mut(&mut self, state: TargetState) -> Option<&mut StageCounts> {
        match state {
            TargetState::Stage1Homepage => Some(&mut self.stage1),
            TargetState::Stage2MultiPage => Some(&mut self.stage2),
            TargetState::Stage3PatternGuess => Some(&mut self.stage3),
            TargetState::NotStarted | TargetState::Done => None,
        }
    }

    pub fn status_count(&self, status: TargetStatus) -> u64 {
        self.statuses
            .get(status.to_db_string())
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> u64 {
        self.fetches.values().sum()
    }

    /// Folds one target's outcome into the totals
    pub fn record_outcome(&mut self, outcome: &TargetOutcome) {
        if outcome.status == TargetStatus::Cancelled {
            self.targets_cancelled += 1;
        } else {
            self.targets_processed += 1;
            *self
                .statuses
                .entry(outcome.status.to_db_string().to_string())
                .or_insert(0) += 1;

            if !outcome.has_signal() {
                self.zero_signal_targets.push(outcome.target.entity_id.clone());
            }
        }

        for stage in &outcome.stages {
            if let Some(counts) = self.stage_mut(stage.state) {
                counts.entered += 1;
                if stage.satisfied {
                    counts.satisfied += 1;
                }
            }
        }

        for fetch in &outcome.fetches {
            *self.fetches.entry(fetch.status.as_str().to_string()).or_insert(0) += 1;
            self.fetch_retries += u64::from(fetch.attempts.saturating_sub(1));
        }

        if outcome.render_required {
            self.render_required += 1;
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
