//! URL handling module for Lead-Ripple
//!
//! This module provides URL normalization (including scheme-less seeds),
//! domain extraction, and the domain denylist used by the signal extractor.

mod denylist;
mod domain;
mod normalize;

pub use denylist::{matches_wildcard, Denylist, DEFAULT_DENYLIST};
pub use domain::{email_domain, extract_domain, same_site};
pub use normalize::{normalize_seed_url, normalize_url, strip_query_and_fragment};

use url::Url;

/// Returns true if the URL points at the site root
///
/// ```
/// use url::Url;
/// use lead_ripple::url::is_homepage;
///
/// assert!(is_homepage(&Url::parse("https://acme.test/").unwrap()));
/// assert!(is_homepage(&Url::parse("https://acme.test/index.html").unwrap()));
/// assert!(!is_homepage(&Url::parse("https://acme.test/about").unwrap()));
/// ```
pub fn is_homepage(url: &Url) -> bool {
    matches!(
        url.path().trim_end_matches('/'),
        "" | "/index.html" | "/index.htm" | "/index.php" | "/home"
    )
}

/// Number of non-empty path segments (`/` is 0, `/services/plumbing` is 2)
pub fn path_depth(url: &Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_homepage_variants() {
        assert!(is_homepage(&url("https://acme.test")));
        assert!(is_homepage(&url("https://acme.test/home/")));
        assert!(!is_homepage(&url("https://acme.test/home/team")));
    }

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth(&url("https://acme.test/")), 0);
        assert_eq!(path_depth(&url("https://acme.test/about")), 1);
        assert_eq!(path_depth(&url("https://acme.test/about/")), 1);
        assert_eq!(path_depth(&url("https://acme.test/a/b/c/d")), 4);
    }
}
