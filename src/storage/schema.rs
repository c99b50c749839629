//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Lead-Ripple store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track enrichment runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stats_json TEXT
);

-- One row per enriched entity
CREATE TABLE IF NOT EXISTS records (
    entity_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Column-like fields with per-field provenance
CREATE TABLE IF NOT EXISTS record_fields (
    entity_id TEXT NOT NULL REFERENCES records(entity_id),
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    source TEXT NOT NULL,
    PRIMARY KEY (entity_id, name)
);

CREATE INDEX IF NOT EXISTS idx_record_fields_name ON record_fields(name);
CREATE INDEX IF NOT EXISTS idx_record_fields_source ON record_fields(source);

-- Every stage or input that contributed to a record
CREATE TABLE IF NOT EXISTS record_sources (
    entity_id TEXT NOT NULL REFERENCES records(entity_id),
    source TEXT NOT NULL,
    PRIMARY KEY (entity_id, source)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
