//! Integration tests for the enrichment engine
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! staged pipeline end-to-end against a temporary SQLite store.

mod common;
mod pipeline_tests;
mod store_tests;
