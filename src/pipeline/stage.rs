//! The stage interface driven by the orchestrator

use crate::config::{EnrichmentConfig, RequiredSignal};
use crate::crawler::{FetchAttempt, FetchStatus, Fetcher, SiteClassification};
use crate::extract::{ExtractRules, ExtractedSignals};
use crate::pipeline::Target;
use crate::state::TargetState;
use async_trait::async_trait;
use std::time::Duration;

/// One escalation level of the pipeline
///
/// Stages are composed statically by the orchestrator. A stage reads what
/// earlier stages found through [`StageContext::progress`] and reports only
/// what it found itself.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The pipeline state this stage runs in
    fn state(&self) -> TargetState;

    async fn run(&self, target: &Target, ctx: &StageContext<'_>) -> StageResult;
}

/// Per-run settings the stages read
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub stage1_timeout: Duration,
    pub stage2_timeout: Duration,
    pub max_pages_per_target: usize,
    pub per_target_concurrency: usize,
    pub classify_sites: bool,
    pub required_signal: RequiredSignal,
}

impl StageSettings {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            stage1_timeout: config.stage1_timeout(),
            stage2_timeout: config.stage2_timeout(),
            max_pages_per_target: config.max_pages_per_target,
            per_target_concurrency: config.per_target_concurrency.max(1),
            classify_sites: config.classify_sites,
            required_signal: config.required_signal,
        }
    }
}

/// What the homepage fetch told us about the site
#[derive(Debug, Clone)]
pub struct HomepageProbe {
    pub status: FetchStatus,
    pub http_status_code: Option<u16>,
    pub final_url: Option<String>,
    pub classification: Option<SiteClassification>,
}

impl HomepageProbe {
    pub fn is_unreachable(&self) -> bool {
        self.status.is_unreachable()
    }

    /// True when the classifier said plain fetching is not enough
    pub fn render_required(&self) -> bool {
        self.classification
            .as_ref()
            .map(|c| !c.is_direct())
            .unwrap_or(false)
    }
}

/// Accumulated per-target state visible to later stages
#[derive(Debug, Clone, Default)]
pub struct TargetProgress {
    /// Union of every stage's signals so far
    pub signals: ExtractedSignals,
    pub homepage: Option<HomepageProbe>,
    pub pages_fetched: usize,
}

/// Shared services and the target's progress, handed to each stage
pub struct StageContext<'a> {
    pub fetcher: &'a Fetcher,
    pub rules: &'a ExtractRules,
    pub settings: &'a StageSettings,
    pub progress: &'a TargetProgress,
}

/// Fetch outcome kept after the body is discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub url: String,
    pub stage: u8,
    pub status: FetchStatus,
    pub http_status_code: Option<u16>,
    pub attempts: u32,
}

impl From<&FetchAttempt> for FetchSummary {
    fn from(attempt: &FetchAttempt) -> Self {
        Self {
            url: attempt.url.clone(),
            stage: attempt.stage,
            status: attempt.status,
            http_status_code: attempt.http_status_code,
            attempts: attempt.attempts,
        }
    }
}

/// Output of one stage for one target
#[derive(Debug, Clone)]
pub struct StageResult {
    pub state: TargetState,
    /// Signals found by this stage alone
    pub signals: ExtractedSignals,
    /// Unverified addresses synthesized by the pattern-guess stage
    pub guessed_emails: Vec<String>,
    /// Whether the required signal holds once this stage's signals are added
    pub satisfied: bool,
    pub fetches: Vec<FetchSummary>,
    /// Set by the homepage stage
    pub homepage: Option<HomepageProbe>,
}

impl StageResult {
    pub fn new(state: TargetState) -> Self {
        Self {
            state,
            signals: ExtractedSignals::default(),
            guessed_emails: Vec::new(),
            satisfied: false,
            fetches: Vec::new(),
            homepage: None,
        }
    }

    /// True if the run was cancelled while this stage was fetching
    pub fn was_cancelled(&self) -> bool {
        self.fetches
            .iter()
            .any(|f| f.status == FetchStatus::Cancelled)
    }

    /// Pages that returned a body, successful or not
    pub fn pages_fetched(&self) -> usize {
        self.fetches
            .iter()
            .filter(|f| f.http_status_code.is_some())
            .count()
    }
}

/// Evaluates the required-signal predicate
///
/// With `DomainEmail` and no known domain, any valid email counts.
pub fn signal_satisfied(
    required: RequiredSignal,
    signals: &ExtractedSignals,
    domain: Option<&str>,
) -> bool {
    match required {
        RequiredSignal::Email => signals.has_email(),
        RequiredSignal::DomainEmail => match domain {
            Some(domain) => signals.has_email_on(domain),
            None => signals.has_email(),
        },
        RequiredSignal::EmailOrSocial => signals.has_email() || signals.has_social(),
    }
}
