//! Storage module for the enrichment store
//!
//! This module handles all persistence for the enrichment engine, including:
//! - SQLite database initialization and schema management
//! - Enrichment records with per-field provenance and fill-missing merges
//! - Filtered export and the summarization input shape
//! - Run tracking with serialized run statistics

mod filter;
mod record;
mod schema;
mod sqlite;
mod traits;

pub use filter::{Filter, FilterOp};
pub use record::{is_empty_value, is_pattern_guess, EnrichmentRecord, FieldValue, MergeMode};
pub use sqlite::SqliteStore;
pub use traits::{EnrichmentStore, ExportRow, StorageError, StorageResult, UpsertSummary};

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Fields that are not passed through as summarization metadata
const NON_METADATA_FIELDS: &[&str] = &["emails", "extracted_text", "links", "headings"];

/// Opens or creates the store at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents an enrichment run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    /// Serialized run statistics, set when the run finishes
    pub stats_json: Option<String>,
}

/// Status of an enrichment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Store-wide counts
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_records: u64,
    pub verified_emails: u64,
    pub pattern_guesses: u64,
    pub total_runs: u64,
    pub latest_run: Option<RunRecord>,
}

/// Record shape consumed by the downstream summarization stage
///
/// Only verified emails are passed on; pattern guesses stay in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryInput {
    pub entity_id: String,
    pub extracted_text: String,
    pub emails: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SummaryInput {
    pub fn from_record(record: &EnrichmentRecord) -> Self {
        let emails = record
            .field("emails")
            .filter(|field| !field.is_pattern_guess())
            .map(|field| split_list(&field.value))
            .unwrap_or_default();

        let metadata = record
            .fields
            .iter()
            .filter(|(name, _)| !NON_METADATA_FIELDS.contains(&name.as_str()))
            .map(|(name, field)| (name.clone(), field.value.clone()))
            .collect();

        Self {
            entity_id: record.entity_id.clone(),
            extracted_text: record.get("extracted_text").unwrap_or_default().to_string(),
            emails,
            metadata,
        }
    }
}

/// Separator for list-valued fields
pub const LIST_SEPARATOR: &str = "; ";

/// Splits a list-valued field
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
