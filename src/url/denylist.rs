//! Domain denylist for extracted links and emails
//!
//! Social networks, review/directory sites and CMS or page-builder
//! infrastructure never represent a target's own contact channel, so links and
//! emails pointing at them are dropped during extraction.

use crate::config::DomainEntry;

/// Domains that are always denied, in wildcard form
pub const DEFAULT_DENYLIST: &[&str] = &[
    // social networks
    "*.facebook.com",
    "*.fb.com",
    "*.instagram.com",
    "*.twitter.com",
    "*.x.com",
    "*.linkedin.com",
    "*.youtube.com",
    "*.youtu.be",
    "*.tiktok.com",
    "*.pinterest.com",
    "*.snapchat.com",
    "*.threads.net",
    // review and directory sites
    "*.yelp.com",
    "*.tripadvisor.com",
    "*.yellowpages.com",
    "*.bbb.org",
    "*.angi.com",
    "*.thumbtack.com",
    "*.houzz.com",
    "*.nextdoor.com",
    "*.trustpilot.com",
    "*.google.com",
    "*.goo.gl",
    "*.apple.com",
    "*.bing.com",
    // CMS and platform infrastructure
    "*.wordpress.com",
    "*.wordpress.org",
    "*.wp.com",
    "*.wix.com",
    "*.wixpress.com",
    "*.wixsite.com",
    "*.squarespace.com",
    "*.godaddy.com",
    "*.godaddysites.com",
    "*.shopify.com",
    "*.myshopify.com",
    "*.weebly.com",
    "*.webflow.io",
    "*.cloudflare.com",
    "*.sentry.io",
    "*.gravatar.com",
    "*.w3.org",
    "*.schema.org",
];

/// Checks if a domain matches a wildcard pattern
///
/// Two pattern forms are supported:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches "example.com" and every
///    subdomain of it
///
/// # Examples
///
/// ```
/// use lead_ripple::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Built-in denylist plus configured extras
#[derive(Debug, Clone)]
pub struct Denylist {
    patterns: Vec<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_DENYLIST.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Denylist {
    /// Creates the default denylist extended with configured entries
    pub fn with_entries(entries: &[DomainEntry]) -> Self {
        let mut denylist = Self::default();
        for entry in entries {
            denylist.add(&entry.domain);
        }
        denylist
    }

    /// Adds a pattern unless it is already present
    pub fn add(&mut self, pattern: &str) {
        let pattern = pattern.trim().to_lowercase();
        if !pattern.is_empty() && !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    /// Returns true if the (lowercase) domain is denied
    pub fn is_denied(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.');
        self.patterns.iter().any(|p| matches_wildcard(p, domain))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
