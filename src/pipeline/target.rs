//! Enrichment targets and their input formats

use crate::config::TargetEntry;
use crate::url::{extract_domain, normalize_seed_url};
use crate::{EnrichError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use url::Url;

/// One entity to enrich
///
/// Built once per run and never mutated afterwards. A target with an
/// unparsable seed still exists so the run can report it; it simply has no
/// URL to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub entity_id: String,
    /// Seed as supplied by the caller
    pub seed_url: String,
    pub display_name: Option<String>,
    pub metadata: BTreeMap<String, String>,
    url: Option<Url>,
    domain: Option<String>,
}

impl Target {
    /// Creates a target from a seed, deriving what the caller left out
    ///
    /// ```
    /// use lead_ripple::Target;
    ///
    /// let target = Target::new(None, "WWW.Acme.test");
    /// assert_eq!(target.entity_id, "acme.test");
    /// assert_eq!(target.url().map(|u| u.as_str()), Some("https://www.acme.test/"));
    /// assert_eq!(target.domain(), Some("acme.test"));
    /// ```
    pub fn new(entity_id: Option<&str>, seed_url: &str) -> Self {
        let url = normalize_seed_url(seed_url).ok();
        // IP hosts have no domain to build addresses on
        let domain = url
            .as_ref()
            .filter(|u| u.domain().is_some())
            .and_then(extract_domain);

        let entity_id = entity_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| domain.clone())
            .unwrap_or_else(|| seed_url.trim().to_lowercase());

        Self {
            entity_id,
            seed_url: seed_url.trim().to_string(),
            display_name: None,
            metadata: BTreeMap::new(),
            url,
            domain,
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        let display_name = display_name.trim();
        if !display_name.is_empty() {
            self.display_name = Some(display_name.to_string());
        }
        self
    }

    /// Overrides the domain used for domain-email checks and pattern guesses
    pub fn with_domain(mut self, domain: &str) -> Self {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        if !domain.is_empty() {
            self.domain = Some(domain.to_string());
        }
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn from_entry(entry: &TargetEntry) -> Self {
        let mut target = Self::new(entry.entity_id.as_deref(), &entry.seed_url);
        if let Some(name) = &entry.display_name {
            target = target.with_display_name(name);
        }
        if let Some(domain) = &entry.domain {
            target = target.with_domain(domain);
        }
        target.metadata = entry.metadata.clone();
        target
    }

    /// Normalized seed URL, `None` when the seed could not be parsed
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The target's own domain, if known
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Host of the seed URL, used to keep Stage 2 on the target's site
    pub fn site_host(&self) -> Option<String> {
        self.url.as_ref().and_then(extract_domain)
    }
}

/// One entry of a JSON targets file
#[derive(Debug, Deserialize)]
struct TargetInput {
    #[serde(default, alias = "id")]
    entity_id: Option<String>,
    #[serde(alias = "url", alias = "website")]
    seed_url: String,
    #[serde(default, alias = "name")]
    display_name: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TargetInput {
    fn into_target(self) -> Target {
        let mut target = Target::new(self.entity_id.as_deref(), &self.seed_url);
        if let Some(name) = &self.display_name {
            target = target.with_display_name(name);
        }
        if let Some(domain) = &self.domain {
            target = target.with_domain(domain);
        }
        for (key, value) in self.metadata {
            let value = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            target.metadata.insert(key, value);
        }
        target
    }
}

/// Parses a JSON array of targets
pub fn parse_targets_json(json: &str) -> Result<Vec<Target>> {
    let inputs: Vec<TargetInput> = serde_json::from_str(json)?;

    let mut targets = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        if input.seed_url.trim().is_empty() {
            return Err(EnrichError::Targets(format!(
                "target #{} has an empty seed_url",
                index + 1
            )));
        }
        targets.push(input.into_target());
    }
    Ok(targets)
}

/// Loads targets from a JSON file
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| EnrichError::Targets(format!("{}: {}", path.display(), e)))?;
    parse_targets_json(&contents)
}

/// Drops later targets that repeat an `entity_id`
///
/// Returns the number of targets removed.
pub fn dedupe_targets(targets: &mut Vec<Target>) -> usize {
    let before = targets.len();
    let mut seen = HashSet::new();
    targets.retain(|target| {
        let fresh = seen.insert(target.entity_id.clone());
        if !fresh {
            tracing::warn!("Duplicate target '{}' ignored", target.entity_id);
        }
        fresh
    });
    before - targets.len()
}
