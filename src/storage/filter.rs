//! Column predicates for filtered export

use crate::storage::record::{is_empty_value, EnrichmentRecord};
use crate::storage::traits::StorageError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Case-insensitive substring
    Contains,
    Present,
    Missing,
}

/// A predicate over one column
///
/// # Syntax
///
/// | Expression | Meaning |
/// |------------|---------|
/// | `col=value` / `col!=value` | equality |
/// | `col>n`, `col>=n`, `col<n`, `col<=n` | threshold (numeric when both sides parse) |
/// | `col~text` | contains, case-insensitive |
/// | `col?` | column present and non-empty |
/// | `!col` | column missing or empty |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: &str) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.to_string(),
        }
    }

    pub fn present(column: &str) -> Self {
        Self::new(column, FilterOp::Present, "")
    }

    pub fn matches(&self, record: &EnrichmentRecord) -> bool {
        let actual = record.column(&self.column).filter(|v| !is_empty_value(v));

        match (self.op, actual) {
            (FilterOp::Present, found) => found.is_some(),
            (FilterOp::Missing, found) => found.is_none(),
            (FilterOp::Ne, None) => true,
            (_, None) => false,
            (FilterOp::Eq, Some(v)) => v == self.value,
            (FilterOp::Ne, Some(v)) => v != self.value,
            (FilterOp::Contains, Some(v)) => v.to_lowercase().contains(&self.value.to_lowercase()),
            (FilterOp::Gt, Some(v)) => compare(v, &self.value) == Ordering::Greater,
            (FilterOp::Ge, Some(v)) => compare(v, &self.value) != Ordering::Less,
            (FilterOp::Lt, Some(v)) => compare(v, &self.value) == Ordering::Less,
            (FilterOp::Le, Some(v)) => compare(v, &self.value) != Ordering::Greater,
        }
    }
}

/// Numeric comparison when both sides are numbers, lexical otherwise
fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

impl FromStr for Filter {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || StorageError::InvalidFilter(s.to_string());

        if let Some(column) = s.strip_prefix('!') {
            if column.is_empty() || column.contains(['=', '<', '>', '~']) {
                return Err(invalid());
            }
            return Ok(Self::new(column.trim(), FilterOp::Missing, ""));
        }

        if let Some(column) = s.strip_suffix('?') {
            if !column.contains(['=', '!', '<', '>', '~']) {
                if column.trim().is_empty() {
                    return Err(invalid());
                }
                return Ok(Self::present(column.trim()));
            }
        }

        let split = s.find(['=', '!', '<', '>', '~']).ok_or_else(invalid)?;
        let (column, rest) = s.split_at(split);
        let column = column.trim();
        if column.is_empty() {
            return Err(invalid());
        }

        let (op, value) = if let Some(v) = rest.strip_prefix(">=") {
            (FilterOp::Ge, v)
        } else if let Some(v) = rest.strip_prefix("<=") {
            (FilterOp::Le, v)
        } else if let Some(v) = rest.strip_prefix("!=") {
            (FilterOp::Ne, v)
        } else if let Some(v) = rest.strip_prefix("==") {
            (FilterOp::Eq, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            (FilterOp::Eq, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (FilterOp::Gt, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (FilterOp::Lt, v)
        } else if let Some(v) = rest.strip_prefix('~') {
            (FilterOp::Contains, v)
        } else {
            return Err(invalid());
        };

        Ok(Self::new(column, op, value.trim()))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            FilterOp::Present => write!(f, "{}?", self.column),
            FilterOp::Missing => write!(f, "!{}", self.column),
            op => {
                let symbol = match op {
                    FilterOp::Eq => "=",
                    FilterOp::Ne => "!=",
                    FilterOp::Gt => ">",
                    FilterOp::Ge => ">=",
                    FilterOp::Lt => "<",
                    FilterOp::Le => "<=",
                    _ => "~",
                };
                write!(f, "{}{}{}", self.column, symbol, self.value)
            }
        }
    }
}
