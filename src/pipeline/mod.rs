//! Pipeline module - the staged enrichment state machine
//!
//! # Components
//!
//! - `Target`: one entity to enrich, built from config or a JSON targets file
//! - `Stage`: the interface each escalation level implements, with the fixed
//!   stages `HomepageStage`, `MultiPageStage` and `PatternGuessStage`
//! - `Orchestrator`: drives targets through the stages and checkpoints results
//! - `TargetOutcome`: what one target produced, convertible to a store record
//! - `RunStats`: run-scoped counters returned by the orchestrator

mod orchestrator;
mod outcome;
mod stage;
mod stages;
mod stats;
mod target;

pub use orchestrator::{next_step, NextStep, Orchestrator, RunOptions};
pub use outcome::{StageRecord, TargetOutcome, Transition, INPUT_SOURCE};
pub use stage::{
    signal_satisfied, FetchSummary, HomepageProbe, Stage, StageContext, StageResult,
    StageSettings, TargetProgress,
};
pub use stages::{HomepageStage, MultiPageStage, PatternGuessStage, GUESS_LOCAL_PARTS};
pub use stats::{RunStats, StageCounts};
pub use target::{dedupe_targets, load_targets, parse_targets_json, Target};
