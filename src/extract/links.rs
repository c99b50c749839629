//! Link resolution and social profile recognition

use crate::url::{extract_domain, normalize_url, strip_query_and_fragment, Denylist};
use serde::Serialize;
use url::Url;

/// Social networks whose profile links are captured separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocialNetwork {
    Facebook,
    Instagram,
    LinkedIn,
    Twitter,
    YouTube,
    TikTok,
}

impl SocialNetwork {
    pub fn all() -> [Self; 6] {
        [
            Self::Facebook,
            Self::Instagram,
            Self::LinkedIn,
            Self::Twitter,
            Self::YouTube,
            Self::TikTok,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::LinkedIn => "linkedin",
            Self::Twitter => "twitter",
            Self::YouTube => "youtube",
            Self::TikTok => "tiktok",
        }
    }

    /// Recognizes the network a (lowercased) host belongs to
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.strip_prefix("www.").unwrap_or(host);
        let is = |base: &str| host == base || host.ends_with(&format!(".{}", base));

        if is("facebook.com") || is("fb.com") {
            Some(Self::Facebook)
        } else if is("instagram.com") {
            Some(Self::Instagram)
        } else if is("linkedin.com") {
            Some(Self::LinkedIn)
        } else if is("twitter.com") || is("x.com") {
            Some(Self::Twitter)
        } else if is("youtube.com") || is("youtu.be") {
            Some(Self::YouTube)
        } else if is("tiktok.com") {
            Some(Self::TikTok)
        } else {
            None
        }
    }
}

/// First profile link found per network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
}

impl SocialLinks {
    pub fn get(&self, network: SocialNetwork) -> Option<&str> {
        self.slot(network).as_deref()
    }

    /// Records a link unless the network already has one
    pub fn set_if_absent(&mut self, network: SocialNetwork, link: String) {
        let slot = self.slot_mut(network);
        if slot.is_none() {
            *slot = Some(link);
        }
    }

    /// Fills networks missing here from `other`
    pub fn union(&mut self, other: &SocialLinks) {
        for network in SocialNetwork::all() {
            if let Some(link) = other.get(network) {
                self.set_if_absent(network, link.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        SocialNetwork::all().iter().all(|n| self.get(*n).is_none())
    }

    /// Present links as (network, url) pairs in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (SocialNetwork, &str)> + '_ {
        SocialNetwork::all()
            .into_iter()
            .filter_map(move |n| self.get(n).map(|link| (n, link)))
    }

    fn slot(&self, network: SocialNetwork) -> &Option<String> {
        match network {
            SocialNetwork::Facebook => &self.facebook,
            SocialNetwork::Instagram => &self.instagram,
            SocialNetwork::LinkedIn => &self.linkedin,
            SocialNetwork::Twitter => &self.twitter,
            SocialNetwork::YouTube => &self.youtube,
            SocialNetwork::TikTok => &self.tiktok,
        }
    }

    fn slot_mut(&mut self, network: SocialNetwork) -> &mut Option<String> {
        match network {
            SocialNetwork::Facebook => &mut self.facebook,
            SocialNetwork::Instagram => &mut self.instagram,
            SocialNetwork::LinkedIn => &mut self.linkedin,
            SocialNetwork::Twitter => &mut self.twitter,
            SocialNetwork::YouTube => &mut self.youtube,
            SocialNetwork::TikTok => &mut self.tiktok,
        }
    }
}

/// Where a resolved href ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkKind {
    /// A crawlable link on a non-denied domain
    Page(String),
    /// A profile on a recognized social network
    Social(SocialNetwork, String),
}

/// Resolves an href against the page URL and classifies it
///
/// Returns None if the link should be excluded:
/// - fragment-only anchors
/// - javascript:, mailto:, tel:, data: schemes
/// - unparseable or non-HTTP(S) URLs
/// - denylisted domains that are not a recognized social network
pub(crate) fn classify_href(href: &str, base_url: &Url, denylist: &Denylist) -> Option<LinkKind> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:", "sms:", "fax:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    strip_query_and_fragment(&mut absolute);

    let host = absolute.host_str()?.to_lowercase();
    if let Some(network) = SocialNetwork::from_host(&host) {
        if is_share_link(&absolute) {
            return None;
        }
        return Some(LinkKind::Social(network, absolute.to_string()));
    }

    let normalized = normalize_url(absolute.as_str()).ok()?;
    let domain = extract_domain(&normalized)?;
    if denylist.is_denied(&domain) {
        return None;
    }

    Some(LinkKind::Page(normalized.to_string()))
}

/// Share buttons and intent URLs point at the network, not at a profile
fn is_share_link(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .map(|first| {
            let first = first.to_ascii_lowercase();
            let first = first.trim_end_matches(".php");
            matches!(first, "sharer" | "share" | "intent" | "dialog" | "sharearticle")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://acme.test/services/").unwrap()
    }

    fn classify(href: &str) -> Option<LinkKind> {
        classify_href(href, &base(), &Denylist::default())
    }

    #[test]
    fn test_relative_links_resolve_and_lose_query() {
        assert_eq!(
            classify("../contact?ref=nav#form"),
            Some(LinkKind::Page("https://acme.test/contact".to_string()))
        );
        assert_eq!(
            classify("plumbing/"),
            Some(LinkKind::Page(
                "https://acme.test/services/plumbing".to_string()
            ))
        );
    }

    #[test]
    fn test_special_schemes_skipped() {
        assert_eq!(classify("#top"), None);
        assert_eq!(classify("mailto:info@acme.test"), None);
        assert_eq!(classify("tel:+15550100"), None);
        assert_eq!(classify("JavaScript:void(0)"), None);
        assert_eq!(classify("ftp://acme.test/file"), None);
    }

    #[test]
    fn test_social_links_are_categorized() {
        assert_eq!(
            classify("https://www.facebook.com/acme?ref=footer"),
            Some(LinkKind::Social(
                SocialNetwork::Facebook,
                "https://www.facebook.com/acme".to_string()
            ))
        );
        assert_eq!(
            classify("https://x.com/acme"),
            Some(LinkKind::Social(
                SocialNetwork::Twitter,
                "https://x.com/acme".to_string()
            ))
        );
    }

    #[test]
    fn test_share_links_are_not_profiles() {
        assert_eq!(classify("https://www.facebook.com/sharer.php?u=https://acme.test"), None);
        assert_eq!(classify("https://facebook.com/sharer/sharer.php?u=x"), None);
        assert_eq!(classify("https://twitter.com/intent/tweet?text=hi"), None);
        assert_eq!(classify("https://www.linkedin.com/shareArticle?url=x"), None);
        assert_eq!(classify("https://www.facebook.com/dialog/share?app_id=1"), None);
        assert_eq!(
            classify("https://twitter.com/acme"),
            Some(LinkKind::Social(
                SocialNetwork::Twitter,
                "https://twitter.com/acme".to_string()
            ))
        );
    }

    #[test]
    fn test_denied_platforms_dropped() {
        assert_eq!(classify("https://www.yelp.com/biz/acme"), None);
        assert_eq!(classify("https://acme.wordpress.com/"), None);
    }

    #[test]
    fn test_social_links_first_wins() {
        let mut social = SocialLinks::default();
        social.set_if_absent(SocialNetwork::Instagram, "https://instagram.com/a".to_string());
        social.set_if_absent(SocialNetwork::Instagram, "https://instagram.com/b".to_string());
        assert_eq!(
            social.get(SocialNetwork::Instagram),
            Some("https://instagram.com/a")
        );
        assert!(!social.is_empty());
        assert_eq!(social.iter().count(), 1);
    }

    #[test]
    fn test_network_from_host() {
        assert_eq!(SocialNetwork::from_host("m.facebook.com"), Some(SocialNetwork::Facebook));
        assert_eq!(SocialNetwork::from_host("youtu.be"), Some(SocialNetwork::YouTube));
        assert_eq!(SocialNetwork::from_host("notfacebook.com"), None);
    }
}
