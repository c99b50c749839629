//! Email candidate discovery and validation
//!
//! Candidates come from two places: `mailto:` links and the visible text of
//! the page. Every candidate goes through [`validate_email`], which rejects
//! the usual false positives of regex scraping (image file names, phone
//! numbers, placeholder addresses, platform infrastructure domains and HTML
//! concatenation artifacts).

use crate::url::Denylist;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Broad email pattern; validation narrows it down
pub(crate) static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,24}").expect("email regex is valid")
});

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{6,}").expect("digit regex is valid"));

/// Top-level domains accepted in an email address
///
/// `test` is the RFC 6761 reserved name, accepted so fixtures resolve like
/// real sites.
const TLD_ALLOW_LIST: &[&str] = &[
    // generic
    "com", "net", "org", "edu", "gov", "mil", "int", "info", "biz", "name", "pro", "mobi", "coop",
    "aero", "museum", "io", "co", "ai", "app", "dev", "tech", "online", "site", "store", "shop",
    "xyz", "club", "agency", "design", "studio", "law", "legal", "health", "care", "clinic",
    "dental", "email", "services", "solutions", "consulting", "company", "group", "team",
    "media", "marketing", "digital", "network", "global", "world", "life", "live", "news",
    "blog", "cloud", "software", "systems", "finance", "insurance", "realty", "restaurant",
    "cafe", "bar", "pub", "fitness", "salon", "auto", "cars", "construction", "contractors",
    "plumbing", "builders", "energy", "farm", "garden", "church", "school", "academy",
    "education", "photography", "art", "events", "travel", "vet", "pet", "us", "me", "tv", "cc",
    // country codes
    "uk", "ca", "au", "nz", "ie", "de", "fr", "es", "it", "nl", "be", "ch", "at", "se", "no",
    "dk", "fi", "is", "pl", "pt", "cz", "sk", "gr", "hu", "ro", "bg", "hr", "si", "ee", "lv",
    "lt", "lu", "ru", "ua", "tr", "il", "ae", "sa", "qa", "in", "pk", "sg", "hk", "jp", "kr",
    "cn", "tw", "th", "my", "id", "ph", "vn", "za", "ng", "ke", "eg", "ma", "br", "mx", "ar",
    "cl", "pe", "uy", "ve", "eu", "asia",
    // reserved
    "test",
];

/// TLDs most often glued to following text by careless HTML-to-text conversion
const ARTIFACT_PREFIXES: &[&str] = &["com", "net", "org", "info", "biz", "edu", "gov", "io", "co"];

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".bmp", ".ico", ".avif", ".tif", ".tiff",
];

const PLACEHOLDER_LOCAL_PARTS: &[&str] = &[
    "noreply",
    "no-reply",
    "no_reply",
    "donotreply",
    "do-not-reply",
    "mailer-daemon",
    "yourname",
    "your.name",
    "youremail",
    "your-email",
    "your_email",
    "email",
    "user",
    "username",
    "name",
    "firstname.lastname",
    "john.doe",
    "jane.doe",
    "johndoe",
];

const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "domain.com",
    "yourdomain.com",
    "yoursite.com",
    "company.com",
    "email.com",
    "mysite.com",
];

/// Why a candidate address was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailRejection {
    Malformed,
    ImageFileName,
    DigitRun,
    Placeholder,
    DeniedDomain,
    ConcatenatedTld,
    UnknownTld,
}

impl fmt::Display for EmailRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Malformed => "malformed",
            Self::ImageFileName => "image file name",
            Self::DigitRun => "digit run",
            Self::Placeholder => "placeholder address",
            Self::DeniedDomain => "denylisted domain",
            Self::ConcatenatedTld => "TLD concatenated with trailing text",
            Self::UnknownTld => "unknown TLD",
        };
        write!(f, "{}", reason)
    }
}

/// Validates one candidate and returns it lowercased
///
/// ```
/// use lead_ripple::extract::{validate_email, EmailRejection};
/// use lead_ripple::url::Denylist;
///
/// let denylist = Denylist::default();
/// assert_eq!(validate_email("Sales@Acme.test", &denylist).unwrap(), "sales@acme.test");
/// assert_eq!(
///     validate_email("info@acme.comabc", &denylist),
///     Err(EmailRejection::ConcatenatedTld)
/// );
/// ```
pub fn validate_email(candidate: &str, denylist: &Denylist) -> Result<String, EmailRejection> {
    let email = candidate
        .trim()
        .trim_matches(|c: char| c == '.' || c == '-')
        .to_lowercase();

    let (local, domain) = email.rsplit_once('@').ok_or(EmailRejection::Malformed)?;
    if local.is_empty()
        || domain.is_empty()
        || local.contains('@')
        || !domain.contains('.')
        || domain.contains("..")
        || domain.starts_with('.')
        || domain.starts_with('-')
    {
        return Err(EmailRejection::Malformed);
    }

    if IMAGE_EXTENSIONS.iter().any(|ext| email.ends_with(ext)) {
        return Err(EmailRejection::ImageFileName);
    }

    if DIGIT_RUN.is_match(&email) {
        return Err(EmailRejection::DigitRun);
    }

    if PLACEHOLDER_LOCAL_PARTS.contains(&local)
        || PLACEHOLDER_DOMAINS.contains(&domain)
        || domain.starts_with("example.")
    {
        return Err(EmailRejection::Placeholder);
    }

    if denylist.is_denied(domain) {
        return Err(EmailRejection::DeniedDomain);
    }

    let tld = domain.rsplit('.').next().unwrap_or_default();
    if !TLD_ALLOW_LIST.contains(&tld) {
        let concatenated = ARTIFACT_PREFIXES
            .iter()
            .any(|prefix| tld.len() > prefix.len() && tld.starts_with(prefix));
        return Err(if concatenated {
            EmailRejection::ConcatenatedTld
        } else {
            EmailRejection::UnknownTld
        });
    }

    Ok(email)
}

/// Extracts the address from a `mailto:` href, dropping any query
pub(crate) fn mailto_address(href: &str) -> Option<&str> {
    let rest = href
        .trim()
        .strip_prefix("mailto:")
        .or_else(|| href.trim().strip_prefix("MAILTO:"))?;
    let address = rest.split('?').next().unwrap_or_default().trim();
    (!address.is_empty()).then_some(address)
}

/// Finds every email-shaped substring of `text`
pub(crate) fn find_candidates(text: &str) -> impl Iterator<Item = &str> {
    EMAIL_REGEX.find_iter(text).map(|m| m.as_str())
}
