//! Signal extractor
//!
//! Turns a fetched page into [`ExtractedSignals`]: validated emails, crawlable
//! links, social profiles, title/meta tags, headings and a short visible-text
//! excerpt. Extraction is a pure function of its inputs. Malformed HTML never
//! fails; it just yields fewer signals.

mod emails;
mod links;
mod metadata;

pub use emails::{validate_email, EmailRejection};
pub use links::{SocialLinks, SocialNetwork};
pub use metadata::PageMetadata;

pub(crate) use metadata::visible_text_fragments;

use crate::url::{email_domain, Denylist};
use links::{classify_href, LinkKind};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use url::Url;

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Characters kept in the visible-text excerpt
pub const TEXT_EXCERPT_CHARS: usize = 2000;

/// Extraction limits and filters
#[derive(Debug, Clone)]
pub struct ExtractRules {
    pub denylist: Denylist,
    /// Links kept per page, after deduplication
    pub max_links: usize,
    /// h1-h3 headings kept per page
    pub max_headings: usize,
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            denylist: Denylist::default(),
            max_links: 50,
            max_headings: 10,
        }
    }
}

/// Signals extracted from one page, or the union over several
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedSignals {
    /// Validated, lowercased emails
    pub emails: BTreeSet<String>,
    /// Normalized links in first-seen order
    pub links: Vec<String>,
    pub social_links: SocialLinks,
    pub metadata: PageMetadata,
    pub headings: Vec<String>,
    /// Visible text, whitespace collapsed
    pub text_excerpt: Option<String>,
}

impl ExtractedSignals {
    pub fn has_email(&self) -> bool {
        !self.emails.is_empty()
    }

    /// True if any email belongs to `domain` or one of its subdomains
    pub fn has_email_on(&self, domain: &str) -> bool {
        self.emails.iter().any(|email| {
            email_domain(email)
                .map(|d| d == domain || d.ends_with(&format!(".{}", domain)))
                .unwrap_or(false)
        })
    }

    pub fn has_social(&self) -> bool {
        !self.social_links.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.links.is_empty()
            && self.social_links.is_empty()
            && self.metadata.is_empty()
            && self.headings.is_empty()
            && self.text_excerpt.is_none()
    }

    /// Merges `other` into `self`
    ///
    /// Emails form a sorted set, links and headings keep first-seen order,
    /// and for every single-valued field the first non-empty value wins.
    pub fn union(&mut self, other: ExtractedSignals) {
        self.emails.extend(other.emails);

        let mut seen: HashSet<String> = self.links.iter().cloned().collect();
        for link in other.links {
            if seen.insert(link.clone()) {
                self.links.push(link);
            }
        }

        for heading in other.headings {
            if !self.headings.contains(&heading) {
                self.headings.push(heading);
            }
        }

        self.social_links.union(&other.social_links);
        self.metadata.union(&other.metadata);
        if self.text_excerpt.is_none() {
            self.text_excerpt = other.text_excerpt;
        }
    }
}

/// Extracts signals from a fetched body
///
/// # Example
///
/// ```
/// use lead_ripple::extract::{extract, ExtractRules};
/// use url::Url;
///
/// let html = r#"<html><head><title>Acme</title></head>
///     <body><a href="/contact">Contact</a> Write to contact@acme.test</body></html>"#;
/// let source = Url::parse("https://acme.test/").unwrap();
/// let signals = extract(html, &source, &ExtractRules::default());
///
/// assert!(signals.emails.contains("contact@acme.test"));
/// assert_eq!(signals.links, vec!["https://acme.test/contact"]);
/// assert_eq!(signals.metadata.title.as_deref(), Some("Acme"));
/// ```
pub fn extract(raw_body: &str, source_url: &Url, rules: &ExtractRules) -> ExtractedSignals {
    if raw_body.trim().is_empty() {
        return ExtractedSignals::default();
    }

    let document = Html::parse_document(raw_body);
    let mut signals = ExtractedSignals {
        metadata: metadata::extract_metadata(&document),
        headings: metadata::extract_headings(&document, rules.max_headings),
        ..Default::default()
    };

    let mut seen_links = HashSet::new();
    for anchor in document.select(&ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        if let Some(address) = emails::mailto_address(href) {
            add_email(&mut signals.emails, address, &rules.denylist);
            continue;
        }

        if anchor.value().attr("download").is_some() {
            continue;
        }

        match classify_href(href, source_url, &rules.denylist) {
            Some(LinkKind::Page(link)) => {
                if signals.links.len() < rules.max_links && seen_links.insert(link.clone()) {
                    signals.links.push(link);
                }
            }
            Some(LinkKind::Social(network, link)) => {
                signals.social_links.set_if_absent(network, link);
            }
            None => {}
        }
    }

    let fragments = metadata::visible_text_fragments(&document);
    // Joined with spaces so text of adjacent elements cannot fuse into one address
    let visible_text = fragments.join(" ");
    for candidate in emails::find_candidates(&visible_text) {
        add_email(&mut signals.emails, candidate, &rules.denylist);
    }
    signals.text_excerpt = metadata::text_excerpt(&fragments, TEXT_EXCERPT_CHARS);

    signals
}

fn add_email(emails: &mut BTreeSet<String>, candidate: &str, denylist: &Denylist) {
    match validate_email(candidate, denylist) {
        Ok(email) => {
            emails.insert(email);
        }
        Err(reason) => {
            tracing::trace!("Rejected email candidate {}: {}", candidate, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Acme Plumbing</title>
    <meta name="description" content="Plumbers in Springfield">
</head>
<body>
    <nav>
        <a href="/">Home</a>
        <a href="/about">About</a>
        <a href="/contact?utm_source=nav">Contact</a>
        <a href="/about#team">Team</a>
        <a href="https://www.facebook.com/acmeplumbing">Facebook</a>
        <a href="https://instagram.com/acme">Instagram</a>
        <a href="https://www.yelp.com/biz/acme">Yelp</a>
        <a href="mailto:Owner@Acme.test?subject=Hi">Email us</a>
        <a href="/brochure.pdf" download>Brochure</a>
    </nav>
    <h1>Acme Plumbing</h1>
    <p>Reach sales at sales@acme.test or call 555-0100.</p>
    <img src="logo@2x.png" alt="logo@2x.png">
    <p>Powered by builder 605a7baede844d278b89dc95ae0a9123@sentry.wixpress.com</p>
    <script>var tracking = "hidden@acme.test";</script>
</body>
</html>"#;

    fn source() -> Url {
        Url::parse("https://www.acme.test/").unwrap()
    }

    #[test]
    fn test_extracts_all_signal_kinds() {
        let signals = extract(PAGE, &source(), &ExtractRules::default());

        assert_eq!(
            signals.emails.iter().cloned().collect::<Vec<_>>(),
            vec!["owner@acme.test", "sales@acme.test"]
        );
        assert_eq!(
            signals.links,
            vec![
                "https://www.acme.test/",
                "https://www.acme.test/about",
                "https://www.acme.test/contact"
            ]
        );
        assert_eq!(
            signals.social_links.facebook.as_deref(),
            Some("https://www.facebook.com/acmeplumbing")
        );
        assert_eq!(
            signals.social_links.instagram.as_deref(),
            Some("https://instagram.com/acme")
        );
        assert_eq!(signals.metadata.title.as_deref(), Some("Acme Plumbing"));
        assert_eq!(
            signals.metadata.description.as_deref(),
            Some("Plumbers in Springfield")
        );
        assert_eq!(signals.headings, vec!["Acme Plumbing"]);
    }

    #[test]
    fn test_share_button_does_not_take_profile_slot() {
        let html = r#"
            <a href="https://www.facebook.com/sharer.php?u=https://acme.test/">Share</a>
            <a href="https://www.facebook.com/acmeplumbing">Follow us</a>"#;
        let signals = extract(html, &source(), &ExtractRules::default());
        assert_eq!(
            signals.social_links.facebook.as_deref(),
            Some("https://www.facebook.com/acmeplumbing")
        );
    }

    #[test]
    fn test_links_keep_www_host() {
        let html = r#"<a href="https://www.acme.com/contact">Contact</a>"#;
        let source = Url::parse("https://www.acme.com/").unwrap();
        let signals = extract(html, &source, &ExtractRules::default());
        assert_eq!(signals.links, vec!["https://www.acme.com/contact"]);
    }

    #[test]
    fn test_denylisted_domains_never_appear_as_links() {
        let signals = extract(PAGE, &source(), &ExtractRules::default());
        let denylist = Denylist::default();

        for link in &signals.links {
            let host = Url::parse(link).unwrap().host_str().unwrap().to_string();
            assert!(!denylist.is_denied(&host), "{} leaked", link);
        }
        assert!(signals.links.iter().all(|l| !l.contains("facebook")));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let rules = ExtractRules::default();
        let first = extract(PAGE, &source(), &rules);
        let second = extract(PAGE, &source(), &rules);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_links_are_capped() {
        let mut html = String::from("<body>");
        for i in 0..80 {
            html.push_str(&format!("<a href=\"/page-{}\">p</a>", i));
        }
        html.push_str("</body>");

        let rules = ExtractRules {
            max_links: 50,
            ..Default::default()
        };
        let signals = extract(&html, &source(), &rules);
        assert_eq!(signals.links.len(), 50);
        assert_eq!(signals.links[0], "https://www.acme.test/page-0");
    }

    #[test]
    fn test_garbage_input_degrades_to_empty() {
        let signals = extract("", &source(), &ExtractRules::default());
        assert!(signals.is_empty());

        let signals = extract("<<<>>> not html at all &&&", &source(), &ExtractRules::default());
        assert!(signals.emails.is_empty());
        assert!(signals.links.is_empty());
    }

    #[test]
    fn test_union_keeps_first_values() {
        let mut a = ExtractedSignals {
            emails: ["b@acme.test".to_string()].into_iter().collect(),
            links: vec!["https://acme.test/about".to_string()],
            metadata: PageMetadata {
                title: Some("Home".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let b = ExtractedSignals {
            emails: ["a@acme.test".to_string()].into_iter().collect(),
            links: vec![
                "https://acme.test/team".to_string(),
                "https://acme.test/about".to_string(),
            ],
            metadata: PageMetadata {
                title: Some("Contact".to_string()),
                description: Some("Get in touch".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        a.union(b);
        assert_eq!(
            a.emails.iter().cloned().collect::<Vec<_>>(),
            vec!["a@acme.test", "b@acme.test"]
        );
        assert_eq!(
            a.links,
            vec!["https://acme.test/about", "https://acme.test/team"]
        );
        assert_eq!(a.metadata.title.as_deref(), Some("Home"));
        assert_eq!(a.metadata.description.as_deref(), Some("Get in touch"));
    }

    #[test]
    fn test_email_on_domain() {
        let signals = ExtractedSignals {
            emails: ["owner@gmail.com".to_string(), "info@shop.acme.test".to_string()]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        assert!(signals.has_email_on("acme.test"));
        assert!(!signals.has_email_on("other.test"));
    }
}
