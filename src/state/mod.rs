//! State module for tracking enrichment progress
//!
//! # Components
//!
//! - `TargetState`: the per-target stage machine (homepage, multi-page, pattern guess)
//! - `TargetStatus`: the final outcome recorded for a target
//! - `SignalSource`: provenance of extracted data, used by the store's merge policy

mod target_state;

pub use target_state::{SignalSource, TargetState, TargetStatus};
