//! Storage traits and error types
//!
//! This module defines the trait interface for enrichment store backends and
//! associated error types.

use crate::storage::filter::Filter;
use crate::storage::record::{EnrichmentRecord, MergeMode};
use crate::storage::{RunRecord, RunStatus, StoreStats, SummaryInput};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid filter expression: '{0}'")]
    InvalidFilter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What one upsert batch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// One exported row, column name to value
pub type ExportRow = BTreeMap<String, String>;

/// Trait for enrichment store implementations
///
/// The store holds at most one record per `entity_id`. It is written by a
/// single writer after each batch of targets; `upsert` must be idempotent so
/// that interrupted runs can simply be replayed.
pub trait EnrichmentStore {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with a status and its serialized statistics
    fn finish_run(&mut self, run_id: i64, status: RunStatus, stats_json: &str)
        -> StorageResult<()>;

    // ===== Records =====

    /// Merges each record into the stored record with the same `entity_id`
    ///
    /// Absent records are inserted as-is. `updated_at` is bumped only for
    /// records the merge actually changed.
    fn upsert(
        &mut self,
        records: &[EnrichmentRecord],
        mode: MergeMode,
    ) -> StorageResult<UpsertSummary>;

    /// Loads all records, or only those with the given IDs
    fn load(&self, ids: Option<&[String]>) -> StorageResult<Vec<EnrichmentRecord>>;

    /// Loads records matching every filter
    fn load_where(&self, filters: &[Filter]) -> StorageResult<Vec<EnrichmentRecord>> {
        Ok(self
            .load(None)?
            .into_iter()
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .collect())
    }

    /// Gets one record
    fn get(&self, entity_id: &str) -> StorageResult<Option<EnrichmentRecord>> {
        let ids = [entity_id.to_string()];
        Ok(self.load(Some(&ids[..]))?.into_iter().next())
    }

    /// Exports matching records as rows
    ///
    /// With `columns`, every row has `entity_id` plus exactly those columns
    /// (empty string when missing). Without, rows carry every stored field.
    fn export(
        &self,
        filters: &[Filter],
        columns: Option<&[String]>,
    ) -> StorageResult<Vec<ExportRow>> {
        let rows = self
            .load_where(filters)?
            .into_iter()
            .map(|record| {
                let mut row = ExportRow::new();
                row.insert("entity_id".to_string(), record.entity_id.clone());
                match columns {
                    Some(columns) => {
                        for column in columns.iter().filter(|c| c.as_str() != "entity_id") {
                            row.insert(
                                column.clone(),
                                record.get(column).unwrap_or_default().to_string(),
                            );
                        }
                    }
                    None => {
                        for (name, field) in &record.fields {
                            row.insert(name.clone(), field.value.clone());
                        }
                        row.insert(
                            "sources".to_string(),
                            record.sources.iter().cloned().collect::<Vec<_>>().join("; "),
                        );
                        if let Some(updated_at) = record.updated_at {
                            row.insert("updated_at".to_string(), updated_at.to_rfc3339());
                        }
                    }
                }
                row
            })
            .collect();
        Ok(rows)
    }

    /// Records in the shape expected by the summarization consumer
    fn summary_inputs(&self, filters: &[Filter]) -> StorageResult<Vec<SummaryInput>> {
        Ok(self
            .load_where(filters)?
            .iter()
            .map(SummaryInput::from_record)
            .collect())
    }

    // ===== Statistics =====

    /// Entity IDs whose record holds a verified email
    fn verified_email_ids(&self) -> StorageResult<Vec<String>>;

    /// Counts used by `--stats`
    fn store_stats(&self) -> StorageResult<StoreStats>;
}
