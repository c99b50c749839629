use crate::url::normalize::strip_www;
use url::Url;

/// Extracts the site domain from a URL
///
/// The host is lowercased and a leading `www.` is dropped, so
/// `https://WWW.Acme.test/` and `https://acme.test/contact` share a domain.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lead_ripple::url::extract_domain;
///
/// let url = Url::parse("https://www.example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://sub.example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| strip_www(&h.to_lowercase()).to_string())
        .filter(|h| !h.is_empty())
}

/// Returns true when two hosts belong to the same site
///
/// Subdomains of the target count as the same site (`shop.acme.test` is part
/// of `acme.test`), the reverse does not.
pub fn same_site(site_domain: &str, candidate_host: &str) -> bool {
    let candidate = strip_www(candidate_host);
    candidate == site_domain || candidate.ends_with(&format!(".{}", site_domain))
}

/// Returns the lowercased domain part of an email address
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_strips_www() {
        let url = Url::parse("https://WWW.Example.com/about").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_same_site() {
        assert!(same_site("acme.test", "acme.test"));
        assert!(same_site("acme.test", "www.acme.test"));
        assert!(same_site("acme.test", "shop.acme.test"));
        assert!(!same_site("acme.test", "notacme.test"));
        assert!(!same_site("shop.acme.test", "acme.test"));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("sales@acme.test"), Some("acme.test"));
        assert_eq!(email_domain("broken@"), None);
        assert_eq!(email_domain("no-at-sign"), None);
    }
}
