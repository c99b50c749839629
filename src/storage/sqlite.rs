//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the EnrichmentStore
//! trait. Records are spread over three tables (`records`, `record_fields`,
//! `record_sources`) so new fields never need a schema change.

use crate::state::SignalSource;
use crate::storage::record::{EnrichmentRecord, FieldValue, MergeMode};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{EnrichmentStore, StorageError, StorageResult, UpsertSummary};
use crate::storage::{RunRecord, RunStatus, StoreStats};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// SQLite enrichment store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the store at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (dry runs and tests)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        stats_json: row.get(5)?,
    })
}

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, stats_json";

/// Loads one record with its fields and sources
fn load_one(conn: &Connection, entity_id: &str) -> StorageResult<Option<EnrichmentRecord>> {
    let updated_at: Option<String> = conn
        .query_row(
            "SELECT updated_at FROM records WHERE entity_id = ?1",
            params![entity_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(updated_at) = updated_at else {
        return Ok(None);
    };

    let mut record = EnrichmentRecord::new(entity_id);
    record.updated_at = parse_timestamp(&updated_at);

    let mut stmt =
        conn.prepare("SELECT name, value, source FROM record_fields WHERE entity_id = ?1")?;
    let fields = stmt.query_map(params![entity_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            FieldValue {
                value: row.get(1)?,
                source: row.get(2)?,
            },
        ))
    })?;
    for field in fields {
        let (name, value) = field?;
        record.fields.insert(name, value);
    }

    let mut stmt = conn.prepare("SELECT source FROM record_sources WHERE entity_id = ?1")?;
    let sources = stmt.query_map(params![entity_id], |row| row.get::<_, String>(0))?;
    for source in sources {
        record.sources.insert(source?);
    }

    Ok(Some(record))
}

/// Writes a full record (row, fields, sources) stamped with `now`
fn write_record(conn: &Connection, record: &EnrichmentRecord, now: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO records (entity_id, created_at, updated_at) VALUES (?1, ?2, ?2)
         ON CONFLICT(entity_id) DO UPDATE SET updated_at = excluded.updated_at",
        params![record.entity_id, now],
    )?;

    let mut field_stmt = conn.prepare_cached(
        "INSERT INTO record_fields (entity_id, name, value, source) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(entity_id, name) DO UPDATE SET value = excluded.value, source = excluded.source",
    )?;
    for (name, field) in &record.fields {
        field_stmt.execute(params![record.entity_id, name, field.value, field.source])?;
    }

    let mut source_stmt = conn
        .prepare_cached("INSERT OR IGNORE INTO record_sources (entity_id, source) VALUES (?1, ?2)")?;
    for source in &record.sources {
        source_stmt.execute(params![record.entity_id, source])?;
    }

    Ok(())
}

impl EnrichmentStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stats_json: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stats_json = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, stats_json, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Records =====

    fn upsert(
        &mut self,
        records: &[EnrichmentRecord],
        mode: MergeMode,
    ) -> StorageResult<UpsertSummary> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut summary = UpsertSummary::default();

        for incoming in records {
            match load_one(&tx, &incoming.entity_id)? {
                None => {
                    write_record(&tx, incoming, &now)?;
                    summary.inserted += 1;
                }
                Some(mut existing) => {
                    if existing.merge(incoming, mode) {
                        write_record(&tx, &existing, &now)?;
                        summary.updated += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    fn load(&self, ids: Option<&[String]>) -> StorageResult<Vec<EnrichmentRecord>> {
        let wanted: Option<HashSet<&str>> = ids.map(|ids| ids.iter().map(String::as_str).collect());
        let keep = |id: &str| wanted.as_ref().map(|w| w.contains(id)).unwrap_or(true);

        let mut records: BTreeMap<String, EnrichmentRecord> = BTreeMap::new();

        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, updated_at FROM records ORDER BY entity_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (entity_id, updated_at) = row?;
            if keep(&entity_id) {
                let mut record = EnrichmentRecord::new(entity_id.clone());
                record.updated_at = parse_timestamp(&updated_at);
                records.insert(entity_id, record);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, name, value, source FROM record_fields")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                FieldValue {
                    value: row.get(2)?,
                    source: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (entity_id, name, field) = row?;
            if let Some(record) = records.get_mut(&entity_id) {
                record.fields.insert(name, field);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT entity_id, source FROM record_sources")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (entity_id, source) = row?;
            if let Some(record) = records.get_mut(&entity_id) {
                record.sources.insert(source);
            }
        }

        Ok(records.into_values().collect())
    }

    fn get(&self, entity_id: &str) -> StorageResult<Option<EnrichmentRecord>> {
        load_one(&self.conn, entity_id)
    }

    // ===== Statistics =====

    fn verified_email_ids(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id FROM record_fields WHERE name = 'emails' AND source != ?1 ORDER BY entity_id",
        )?;
        let ids = stmt
            .query_map(params![SignalSource::PATTERN_GUESS], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn store_stats(&self) -> StorageResult<StoreStats> {
        let total_records: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;

        let count_emails = |comparison: &str| -> StorageResult<i64> {
            let count = self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM record_fields WHERE name = 'emails' AND source {} ?1",
                    comparison
                ),
                params![SignalSource::PATTERN_GUESS],
                |row| row.get(0),
            )?;
            Ok(count)
        };

        let total_runs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;

        Ok(StoreStats {
            total_records: total_records as u64,
            verified_emails: count_emails("!=")? as u64,
            pattern_guesses: count_emails("=")? as u64,
            total_runs: total_runs as u64,
            latest_run: self.get_latest_run()?,
        })
    }
}
