//! Site classifier
//!
//! Decides from one homepage probe whether plain HTTP fetching is enough for
//! a site, or whether its content only appears after JavaScript runs (or is
//! hidden behind bot protection) and needs a rendering pipeline.
//!
//! Scoring is a pure function of the probe ([`classify_attempt`]); the probe
//! itself is the regular Stage 1 homepage fetch.

use crate::crawler::fetcher::{FetchAttempt, FetchStatus};
use crate::extract::visible_text_fragments;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;

static SCRIPTS: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());

const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "access denied",
    "attention required",
    "checking your browser",
    "cf-browser-verification",
    "are you a robot",
    "request blocked",
    "ddos protection by",
    "bot detection",
];

const STRUCTURAL_TAGS: &[&str] = &[
    "header", "nav", "main", "footer", "article", "section", "h1", "address",
];

const BUSINESS_KEYWORDS: &[&str] = &[
    "about",
    "contact",
    "services",
    "team",
    "phone",
    "address",
    "hours",
    "email",
    "location",
    "products",
    "pricing",
    "clients",
    "quote",
    "appointment",
];

const SPA_MARKERS: &[&str] = &[
    "id=\"root\"",
    "id=\"app\"",
    "id=\"__next\"",
    "__next_data__",
    "data-reactroot",
    "ng-version",
    "ng-app",
    "data-v-app",
    "window.__nuxt__",
    "data-server-rendered",
];

const LOADING_MARKERS: &[&str] = &[
    "loading...",
    "enable javascript",
    "javascript is required",
    "requires javascript",
    "spinner",
];

/// Quality needed for a direct-fetch recommendation
const QUALITY_THRESHOLD: u32 = 30;

/// JavaScript risk at which rendering is recommended
const JS_RISK_THRESHOLD: u32 = 40;

/// How a site should be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMethod {
    DirectFetch,
    RenderRequired,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectFetch => "direct-fetch",
            Self::RenderRequired => "render-required",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of classifying one site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteClassification {
    pub method: FetchMethod,
    /// 0..=1
    pub confidence: f64,
    pub reasons: Vec<String>,
    /// 0..=100
    pub content_quality: u32,
    /// 0..=100
    pub js_risk: u32,
    pub blocked: bool,
}

impl SiteClassification {
    pub fn is_direct(&self) -> bool {
        self.method == FetchMethod::DirectFetch
    }
}

/// Classifies a site from its homepage fetch
///
/// | Probe outcome | Method | Confidence |
/// |---------------|--------|------------|
/// | Timeout / network error | render-required | 0.9 |
/// | Bot protection markers | render-required | 0.95 |
/// | Other HTTP error | direct-fetch | 0.5 |
/// | 2xx | scored | by distance from the thresholds |
pub fn classify_attempt(attempt: &FetchAttempt) -> SiteClassification {
    let body = attempt.body().unwrap_or_default();
    let lowered = body.to_lowercase();

    if attempt.status.is_unreachable() || attempt.status == FetchStatus::Cancelled {
        return SiteClassification {
            method: FetchMethod::RenderRequired,
            confidence: 0.9,
            reasons: vec![format!("homepage unreachable ({})", attempt.status)],
            content_quality: 0,
            js_risk: 0,
            blocked: false,
        };
    }

    let block_markers: Vec<&str> = BLOCK_MARKERS
        .iter()
        .copied()
        .filter(|marker| lowered.contains(marker))
        .collect();
    let blocked_status = matches!(attempt.http_status_code, Some(403) | Some(429));
    if !block_markers.is_empty() || (blocked_status && body.len() < 5_000 && !lowered.is_empty())
    {
        let mut reasons = Vec::new();
        if let Some(code) = attempt.http_status_code.filter(|_| blocked_status) {
            reasons.push(format!("HTTP {} from homepage", code));
        }
        if !block_markers.is_empty() {
            reasons.push(format!("bot protection markers: {}", block_markers.join(", ")));
        }
        return SiteClassification {
            method: FetchMethod::RenderRequired,
            confidence: 0.95,
            reasons,
            content_quality: 0,
            js_risk: 0,
            blocked: true,
        };
    }

    if attempt.status == FetchStatus::HttpError {
        return SiteClassification {
            method: FetchMethod::DirectFetch,
            confidence: 0.5,
            reasons: vec![format!(
                "homepage returned HTTP {}; content not scored",
                attempt
                    .http_status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "error".to_string())
            )],
            content_quality: 0,
            js_risk: 0,
            blocked: false,
        };
    }

    let document = Html::parse_document(body);
    let text_len: usize = visible_text_fragments(&document)
        .iter()
        .map(|fragment| fragment.chars().count() + 1)
        .sum();
    let script_count = document.select(&SCRIPTS).count();

    let mut reasons = Vec::new();
    let content_quality = score_quality(&document, &lowered, text_len, &mut reasons);
    let js_risk = score_js_risk(&lowered, text_len, script_count, &mut reasons);

    let method = if content_quality >= QUALITY_THRESHOLD && js_risk < JS_RISK_THRESHOLD {
        FetchMethod::DirectFetch
    } else {
        FetchMethod::RenderRequired
    };

    let margin = content_quality as f64 - js_risk as f64;
    let confidence = (0.5 + margin.abs() / 200.0).min(0.95);

    SiteClassification {
        method,
        confidence,
        reasons,
        content_quality,
        js_risk,
        blocked: false,
    }
}

fn score_quality(document: &Html, lowered: &str, text_len: usize, reasons: &mut Vec<String>) -> u32 {
    let length_score = match text_len {
        n if n >= 2000 => 40,
        n if n >= 500 => 25,
        n if n >= 100 => 10,
        _ => 0,
    };
    if length_score == 0 {
        reasons.push(format!("very little visible text ({} chars)", text_len));
    }

    let structure_score = STRUCTURAL_TAGS
        .iter()
        .filter(|tag| {
            Selector::parse(tag)
                .map(|selector| document.select(&selector).next().is_some())
                .unwrap_or(false)
        })
        .count() as u32
        * 5;

    let keyword_score = BUSINESS_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count() as u32
        * 3;

    length_score + structure_score.min(30) + keyword_score.min(30)
}

fn score_js_risk(lowered: &str, text_len: usize, script_count: usize, reasons: &mut Vec<String>) -> u32 {
    let mut risk = 0;

    let spa: Vec<&str> = SPA_MARKERS
        .iter()
        .copied()
        .filter(|marker| lowered.contains(marker))
        .collect();
    if !spa.is_empty() {
        risk += 20 * spa.len() as u32;
        reasons.push(format!("SPA framework markers: {}", spa.join(", ")));
    }

    let loading = LOADING_MARKERS
        .iter()
        .filter(|marker| lowered.contains(*marker))
        .count() as u32;
    if loading > 0 {
        risk += 15 * loading;
        reasons.push("async loading placeholders".to_string());
    }

    if script_count > 15 {
        risk += 20;
        reasons.push(format!("{} script tags", script_count));
    }

    if text_len < 200 && script_count > 0 {
        risk += 25;
        reasons.push("script-driven page with little static text".to_string());
    }

    risk.min(100)
}
