//! Enrichment records and their merge policy

use crate::state::SignalSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Values that carry no information and count as empty
const PLACEHOLDER_VALUES: &[&str] = &["nan", "none", "null", "n/a", "na", "-", "--"];

/// Returns true if a stored or incoming value counts as empty
///
/// ```
/// use lead_ripple::storage::is_empty_value;
///
/// assert!(is_empty_value("  "));
/// assert!(is_empty_value("NaN"));
/// assert!(is_empty_value("N/A"));
/// assert!(!is_empty_value("sales@acme.test"));
/// ```
pub fn is_empty_value(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || PLACEHOLDER_VALUES
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

/// Returns true if data from `source` is an unverified pattern guess
pub fn is_pattern_guess(source: &str) -> bool {
    source == SignalSource::PATTERN_GUESS
}

/// How incoming values treat existing non-empty fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Only empty fields are written
    #[default]
    FillMissing,
    /// Incoming non-empty values replace existing ones
    Overwrite,
}

impl MergeMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::FillMissing
        }
    }
}

/// One stored value and the stage or input that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub value: String,
    pub source: String,
}

impl FieldValue {
    pub fn is_pattern_guess(&self) -> bool {
        is_pattern_guess(&self.source)
    }
}

/// The persisted enrichment result for one entity
///
/// Fields are free-form and column-like; later runs and other pipelines may
/// add new ones. Empty and placeholder values are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentRecord {
    pub entity_id: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub sources: BTreeSet<String>,
    /// Set by the store; None for records not yet persisted
    pub updated_at: Option<DateTime<Utc>>,
}

impl EnrichmentRecord {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            fields: BTreeMap::new(),
            sources: BTreeSet::new(),
            updated_at: None,
        }
    }

    /// Builder form of [`set_field`](Self::set_field)
    pub fn with_field(mut self, name: &str, value: impl Into<String>, source: &str) -> Self {
        self.set_field(name, value, source);
        self
    }

    /// Sets a field, ignoring empty values, and records the source
    pub fn set_field(&mut self, name: &str, value: impl Into<String>, source: &str) {
        let value = value.into();
        if is_empty_value(&value) {
            return;
        }

        self.fields.insert(
            name.to_string(),
            FieldValue {
                value: value.trim().to_string(),
                source: source.to_string(),
            },
        );
        self.sources.insert(source.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|field| field.value.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Value of a column, `entity_id` included
    pub fn column(&self, name: &str) -> Option<&str> {
        if name == "entity_id" {
            Some(&self.entity_id)
        } else {
            self.get(name)
        }
    }

    /// True if the record holds an email observed on the site
    pub fn has_verified_email(&self) -> bool {
        self.field("emails")
            .map(|field| !field.is_pattern_guess())
            .unwrap_or(false)
    }

    /// Merges `incoming` into `self`, returning true if anything changed
    ///
    /// # Field policy
    ///
    /// | Existing | Incoming | FillMissing | Overwrite |
    /// |----------|----------|-------------|-----------|
    /// | missing | any | write | write |
    /// | pattern guess | verified | write | write |
    /// | verified | pattern guess | keep | keep |
    /// | non-empty | non-empty | keep | write |
    ///
    /// Empty incoming values are never written. Sources are unioned.
    pub fn merge(&mut self, incoming: &EnrichmentRecord, mode: MergeMode) -> bool {
        let mut changed = false;

        for (name, new) in &incoming.fields {
            if is_empty_value(&new.value) {
                continue;
            }

            let replace = match self.fields.get(name) {
                None => true,
                Some(existing) if is_empty_value(&existing.value) => true,
                Some(existing) if existing == new => false,
                Some(existing) if existing.is_pattern_guess() && !new.is_pattern_guess() => true,
                Some(existing) if !existing.is_pattern_guess() && new.is_pattern_guess() => false,
                Some(_) => mode == MergeMode::Overwrite,
            };

            if replace {
                self.fields.insert(name.clone(), new.clone());
                changed = true;
            }
        }

        for source in &incoming.sources {
            if self.sources.insert(source.clone()) {
                changed = true;
            }
        }

        changed
    }
}
