//! The three fixed stages: homepage, multi-page crawl, pattern guess

use crate::crawler::{classify, prioritize, FetchAttempt, FALLBACK_PATHS};
use crate::extract::{extract, validate_email, ExtractRules, ExtractedSignals};
use crate::pipeline::stage::{
    signal_satisfied, FetchSummary, HomepageProbe, Stage, StageContext, StageResult,
};
use crate::pipeline::Target;
use crate::state::TargetState;
use crate::url::{is_homepage, same_site};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use url::Url;

/// Local parts tried by the pattern-guess stage, in order of preference
pub const GUESS_LOCAL_PARTS: &[&str] = &["info", "contact", "hello", "sales", "support", "office"];

/// Extracts signals from an attempt's body, empty when there is none
fn extract_attempt(attempt: &FetchAttempt, rules: &ExtractRules) -> ExtractedSignals {
    let Some(body) = attempt.body() else {
        return ExtractedSignals::default();
    };
    match Url::parse(attempt.base_url()) {
        Ok(base) => extract(body, &base, rules),
        Err(e) => {
            tracing::debug!("Unusable base URL {}: {}", attempt.base_url(), e);
            ExtractedSignals::default()
        }
    }
}

/// Whether the predicate holds for everything found so far plus `found`
fn satisfied_with(ctx: &StageContext<'_>, target: &Target, found: &ExtractedSignals) -> bool {
    let mut combined = ctx.progress.signals.clone();
    combined.union(found.clone());
    signal_satisfied(ctx.settings.required_signal, &combined, target.domain())
}

/// Stage 1: one fetch of the seed URL
///
/// When site classification is enabled the fetch doubles as the classifier
/// probe.
pub struct HomepageStage;

#[async_trait]
impl Stage for HomepageStage {
    fn state(&self) -> TargetState {
        TargetState::Stage1Homepage
    }

    async fn run(&self, target: &Target, ctx: &StageContext<'_>) -> StageResult {
        let mut result = StageResult::new(self.state());
        let Some(seed) = target.url() else {
            return result;
        };

        let timeout = ctx.settings.stage1_timeout;
        let (attempt, classification) = if ctx.settings.classify_sites {
            let (attempt, classification) = classify(ctx.fetcher, seed, timeout).await;
            (attempt, Some(classification))
        } else {
            (ctx.fetcher.fetch(seed.as_str(), 1, timeout).await, None)
        };

        result.signals = extract_attempt(&attempt, ctx.rules);
        result.satisfied = satisfied_with(ctx, target, &result.signals);
        result.fetches.push(FetchSummary::from(&attempt));
        result.homepage = Some(HomepageProbe {
            status: attempt.status,
            http_status_code: attempt.http_status_code,
            final_url: attempt.final_url.clone(),
            classification,
        });
        result
    }
}

/// Stage 2: a bounded crawl of the highest-value pages on the target's site
pub struct MultiPageStage;

impl MultiPageStage {
    /// Picks the pages to fetch from what the homepage linked to
    ///
    /// Only links on the target's own host are considered and the homepage
    /// itself is never fetched again. Without any candidate links, common
    /// contact paths are tried instead.
    pub fn select_pages(target: &Target, ctx: &StageContext<'_>) -> Vec<String> {
        let Some(seed) = target.url() else {
            return Vec::new();
        };

        // Redirects may have moved the site (http -> https, bare -> www)
        let base = ctx
            .progress
            .homepage
            .as_ref()
            .and_then(|probe| probe.final_url.as_deref())
            .and_then(|u| Url::parse(u).ok())
            .unwrap_or_else(|| seed.clone());
        let Some(site_host) = target.site_host() else {
            return Vec::new();
        };
        let base_host = crate::url::extract_domain(&base).unwrap_or_else(|| site_host.clone());

        let mut already_fetched = HashSet::new();
        already_fetched.insert(seed.as_str().trim_end_matches('/').to_string());
        already_fetched.insert(base.as_str().trim_end_matches('/').to_string());

        let on_site = |url: &Url| {
            url.host_str()
                .map(|host| {
                    let host = host.to_lowercase();
                    same_site(&site_host, &host) || same_site(&base_host, &host)
                })
                .unwrap_or(false)
        };

        let mut candidates: Vec<String> = ctx
            .progress
            .signals
            .links
            .iter()
            .filter_map(|link| Url::parse(link).ok())
            .filter(|url| on_site(url) && !is_homepage(url))
            .map(|url| url.to_string())
            .filter(|link| !already_fetched.contains(link.trim_end_matches('/')))
            .collect();

        if candidates.is_empty() {
            candidates = FALLBACK_PATHS
                .iter()
                .filter_map(|path| base.join(path).ok())
                .map(|url| url.to_string())
                .collect();
        }

        prioritize(&candidates, ctx.settings.max_pages_per_target.saturating_sub(1))
    }
}

#[async_trait]
impl Stage for MultiPageStage {
    fn state(&self) -> TargetState {
        TargetState::Stage2MultiPage
    }

    async fn run(&self, target: &Target, ctx: &StageContext<'_>) -> StageResult {
        let mut result = StageResult::new(self.state());
        let pages = Self::select_pages(target, ctx);
        if pages.is_empty() {
            return result;
        }

        tracing::debug!(
            entity_id = %target.entity_id,
            pages = pages.len(),
            "Fetching prioritized pages"
        );

        let timeout = ctx.settings.stage2_timeout;
        let fetcher = ctx.fetcher;
        // `buffered` keeps page order, so the union below is deterministic
        let attempts: Vec<FetchAttempt> = stream::iter(pages)
            .map(|page| async move { fetcher.fetch(&page, 2, timeout).await })
            .buffered(ctx.settings.per_target_concurrency)
            .collect()
            .await;

        for attempt in &attempts {
            result.signals.union(extract_attempt(attempt, ctx.rules));
            result.fetches.push(FetchSummary::from(attempt));
        }
        result.satisfied = satisfied_with(ctx, target, &result.signals);
        result
    }
}

/// Stage 3: synthesizes likely addresses on the target's domain
///
/// Issues no requests. Everything it produces is unverified.
pub struct PatternGuessStage;

impl PatternGuessStage {
    /// Candidate addresses for `domain`, in vocabulary order
    pub fn guesses(domain: &str, rules: &ExtractRules) -> Vec<String> {
        GUESS_LOCAL_PARTS
            .iter()
            .filter_map(|local| validate_email(&format!("{}@{}", local, domain), &rules.denylist).ok())
            .collect()
    }
}

#[async_trait]
impl Stage for PatternGuessStage {
    fn state(&self) -> TargetState {
        TargetState::Stage3PatternGuess
    }

    async fn run(&self, target: &Target, ctx: &StageContext<'_>) -> StageResult {
        let mut result = StageResult::new(self.state());
        if let Some(domain) = target.domain() {
            result.guessed_emails = Self::guesses(domain, ctx.rules);
        }
        result.satisfied = !result.guessed_emails.is_empty();
        result
    }
}
