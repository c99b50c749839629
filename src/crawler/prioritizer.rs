//! Link prioritizer
//!
//! Ranks the links found on a target's homepage by how likely they are to
//! carry contact details, so Stage 2 fetches a handful of pages instead of
//! crawling the whole site.

use crate::url::{is_homepage, path_depth};
use url::Url;

/// Path keywords of pages worth fetching
const HIGH_VALUE_KEYWORDS: &[&str] = &[
    "about",
    "contact",
    "services",
    "team",
    "staff",
    "people",
    "leadership",
    "case-studies",
    "company",
    "who-we-are",
    "our-story",
    "locations",
    "impressum",
];

/// Path keywords of pages that never carry contact details
const LOW_VALUE_KEYWORDS: &[&str] = &[
    "privacy",
    "terms",
    "cookie",
    "legal",
    "careers",
    "jobs",
    "blog",
    "news",
    "login",
    "signin",
    "sign-in",
    "register",
    "cart",
    "checkout",
    "account",
    "wp-admin",
    "feed",
    "sitemap",
];

/// Paths that are contact pages outright
const CONTACT_KEYWORDS: &[&str] = &["contact", "kontakt", "get-in-touch"];

/// Candidate pages tried when the homepage yielded no links
pub const FALLBACK_PATHS: &[&str] = &["/contact", "/contact-us", "/about", "/about-us"];

const HIGH_VALUE_SCORE: i32 = 10;
const CONTACT_BONUS: i32 = 5;
const LOW_VALUE_PENALTY: i32 = -20;
const TOP_LEVEL_BONUS: i32 = 5;
const DEEP_PATH_PENALTY: i32 = -3;

/// Scores a link by business relevance
///
/// # Scoring
///
/// | Rule | Points |
/// |------|--------|
/// | Each high-value keyword in the path | +10 |
/// | Contact-type path | +5 |
/// | Each low-value keyword in the path | -20 |
/// | Depth 1 (`/about`) | +5 |
/// | Depth > 3 | -3 |
pub fn score_link(url: &Url) -> i32 {
    let path = url.path().to_lowercase();
    let mut score = 0;

    for keyword in HIGH_VALUE_KEYWORDS {
        if path.contains(keyword) {
            score += HIGH_VALUE_SCORE;
        }
    }

    if CONTACT_KEYWORDS.iter().any(|keyword| path.contains(keyword)) {
        score += CONTACT_BONUS;
    }

    for keyword in LOW_VALUE_KEYWORDS {
        if path.contains(keyword) {
            score += LOW_VALUE_PENALTY;
        }
    }

    match path_depth(url) {
        1 => score += TOP_LEVEL_BONUS,
        depth if depth > 3 => score += DEEP_PATH_PENALTY,
        _ => {}
    }

    score
}

/// Selects up to `max_count` links, most relevant first
///
/// The homepage, if among the candidates, always comes first. The remaining
/// slots go to the highest-scoring links; ties keep discovery order. Links
/// scoring below zero are dropped. Unparseable links are ignored.
///
/// ```
/// use lead_ripple::crawler::prioritize;
///
/// let links = vec![
///     "https://acme.test/about".to_string(),
///     "https://acme.test/privacy".to_string(),
///     "https://acme.test/contact".to_string(),
/// ];
/// assert_eq!(
///     prioritize(&links, 3),
///     vec!["https://acme.test/contact", "https://acme.test/about"]
/// );
/// ```
pub fn prioritize(links: &[String], max_count: usize) -> Vec<String> {
    if max_count == 0 {
        return Vec::new();
    }

    let mut homepage = None;
    let mut scored: Vec<(i32, &String)> = Vec::new();

    for link in links {
        let Ok(url) = Url::parse(link) else {
            continue;
        };

        if is_homepage(&url) {
            if homepage.is_none() {
                homepage = Some(link.clone());
            }
            continue;
        }

        if scored.iter().any(|(_, seen)| *seen == link) {
            continue;
        }

        let score = score_link(&url);
        if score >= 0 {
            scored.push((score, link));
        }
    }

    // Stable sort keeps discovery order among equal scores
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let remaining = if homepage.is_some() {
        max_count - 1
    } else {
        max_count
    };

    homepage
        .into_iter()
        .chain(scored.into_iter().take(remaining).map(|(_, link)| link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .map(|p| format!("https://acme.test{}", p))
            .collect()
    }

    fn score(path: &str) -> i32 {
        score_link(&Url::parse(&format!("https://acme.test{}", path)).unwrap())
    }

    #[test]
    fn test_scores() {
        assert_eq!(score("/about"), 15);
        assert_eq!(score("/contact"), 20);
        assert_eq!(score("/privacy"), -15);
        assert_eq!(score("/services/plumbing"), 10);
        assert_eq!(score("/a/b/c/d"), -3);
        assert_eq!(score("/blog/about-our-team"), 0);
    }

    #[test]
    fn test_homepage_always_first() {
        let result = prioritize(&links(&["/about", "/", "/contact", "/team"]), 3);
        assert_eq!(result, links(&["/", "/contact", "/about"]));
    }

    #[test]
    fn test_low_value_pages_dropped() {
        let result = prioritize(&links(&["/privacy", "/careers", "/login", "/about"]), 10);
        assert_eq!(result, links(&["/about"]));
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let result = prioritize(&links(&["/gallery", "/pricing", "/faq"]), 10);
        assert_eq!(result, links(&["/gallery", "/pricing", "/faq"]));
    }

    #[test]
    fn test_cap_and_duplicates() {
        let result = prioritize(
            &links(&["/about", "/about", "/services", "/team", "/contact"]),
            2,
        );
        assert_eq!(result, links(&["/contact", "/about"]));
        assert!(prioritize(&links(&["/about"]), 0).is_empty());
    }

    #[test]
    fn test_fallback_paths_rank_contact_first() {
        let result = prioritize(&links(FALLBACK_PATHS), 3);
        assert_eq!(result, links(&["/contact", "/contact-us", "/about"]));
    }
}
