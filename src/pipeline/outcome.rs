//! Per-target results and their conversion into store records

use crate::crawler::SiteClassification;
use crate::extract::ExtractedSignals;
use crate::pipeline::{FetchSummary, Target};
use crate::state::{SignalSource, TargetState, TargetStatus};
use crate::storage::{EnrichmentRecord, LIST_SEPARATOR};
use crate::url::email_domain;

/// Source tag for fields copied from the target descriptor
pub const INPUT_SOURCE: &str = "input";

/// One state machine step with the reason it was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: TargetState,
    pub to: TargetState,
    pub reason: String,
}

/// A stage that ran for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRecord {
    pub state: TargetState,
    pub satisfied: bool,
}

/// Everything the pipeline learned about one target
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: Target,
    pub status: TargetStatus,
    pub final_state: TargetState,
    /// Union of the signals observed on the site
    pub signals: ExtractedSignals,
    /// Stage whose signals satisfied the predicate, or first produced an email
    pub email_source: Option<SignalSource>,
    pub guessed_emails: Vec<String>,
    pub transitions: Vec<Transition>,
    pub stages: Vec<StageRecord>,
    pub fetches: Vec<FetchSummary>,
    pub classification: Option<SiteClassification>,
    pub render_required: bool,
    pub pages_fetched: usize,
}

impl TargetOutcome {
    pub fn new(target: Target, status: TargetStatus) -> Self {
        Self {
            target,
            status,
            final_state: TargetState::NotStarted,
            signals: ExtractedSignals::default(),
            email_source: None,
            guessed_emails: Vec::new(),
            transitions: Vec::new(),
            stages: Vec::new(),
            fetches: Vec::new(),
            classification: None,
            render_required: false,
            pages_fetched: 0,
        }
    }

    /// True if the site yielded a verified email or a social profile
    pub fn has_signal(&self) -> bool {
        self.signals.has_email() || self.signals.has_social()
    }

    /// Stage that produced the page-level fields
    fn page_source(&self) -> SignalSource {
        let multi_page_fetched = self
            .fetches
            .iter()
            .any(|f| f.stage == 2 && f.http_status_code.is_some());
        if multi_page_fetched {
            SignalSource::Stage2
        } else {
            SignalSource::Stage1
        }
    }

    /// Best address to contact: on the target's domain if possible
    fn primary_email(&self) -> Option<&String> {
        let domain = self.target.domain();
        self.signals
            .emails
            .iter()
            .find(|email| {
                matches!((email_domain(email), domain), (Some(d), Some(target)) if d == target)
            })
            .or_else(|| self.signals.emails.iter().next())
    }

    /// Builds the record to upsert for this target
    ///
    /// Verified emails always take the `emails` column; pattern guesses only
    /// fill it when nothing was found on the site, and carry the
    /// `pattern_guess` source so a later verified value can replace them.
    pub fn to_record(&self) -> EnrichmentRecord {
        let target = &self.target;
        let mut record = EnrichmentRecord::new(target.entity_id.clone());

        record.set_field("seed_url", target.seed_url.clone(), INPUT_SOURCE);
        if let Some(name) = &target.display_name {
            record.set_field("display_name", name.clone(), INPUT_SOURCE);
        }
        if let Some(domain) = target.domain() {
            record.set_field("domain", domain, INPUT_SOURCE);
        }
        for (key, value) in &target.metadata {
            if key != "entity_id" {
                record.set_field(key, value.clone(), INPUT_SOURCE);
            }
        }

        let email_source = self.email_source.unwrap_or(SignalSource::Stage1);
        if self.signals.has_email() {
            let source = email_source.as_str();
            let emails: Vec<&str> = self.signals.emails.iter().map(String::as_str).collect();
            record.set_field("emails", emails.join(LIST_SEPARATOR), source);
            if let Some(primary) = self.primary_email() {
                record.set_field("primary_email", primary.clone(), source);
            }
            record.set_field("email_source", source, source);
            record.set_field("email_confidence", "verified", source);
        } else if !self.guessed_emails.is_empty() {
            let source = SignalSource::PatternGuess.as_str();
            record.set_field("emails", self.guessed_emails.join(LIST_SEPARATOR), source);
            record.set_field("primary_email", self.guessed_emails[0].clone(), source);
            record.set_field("email_source", source, source);
            record.set_field("email_confidence", "unverified", source);
        }

        match self.status {
            TargetStatus::Found => {
                record.set_field("enrichment_status", "found", email_source.as_str())
            }
            TargetStatus::Guessed => record.set_field(
                "enrichment_status",
                "guessed",
                SignalSource::PatternGuess.as_str(),
            ),
            _ => {}
        }

        let page_source = self.page_source().as_str();
        let signals = &self.signals;
        if let Some(title) = &signals.metadata.title {
            record.set_field("title", title.clone(), page_source);
        }
        if let Some(description) = &signals.metadata.description {
            record.set_field("description", description.clone(), page_source);
        }
        if let Some(keywords) = &signals.metadata.keywords {
            record.set_field("keywords", keywords.clone(), page_source);
        }
        if !signals.headings.is_empty() {
            record.set_field("headings", signals.headings.join(LIST_SEPARATOR), page_source);
        }
        if !signals.links.is_empty() {
            record.set_field("links", signals.links.join(LIST_SEPARATOR), page_source);
        }
        for (network, link) in signals.social_links.iter() {
            record.set_field(&format!("social_{}", network.as_str()), link, page_source);
        }
        if let Some(text) = &signals.text_excerpt {
            record.set_field("extracted_text", text.clone(), page_source);
        }

        if let Some(classification) = &self.classification {
            let stage1 = SignalSource::Stage1.as_str();
            record.set_field("site_method", classification.method.as_str(), stage1);
            record.set_field(
                "site_confidence",
                format!("{:.2}", classification.confidence),
                stage1,
            );
        }
        if self.render_required {
            record.set_field("render_required", "true", SignalSource::Stage1.as_str());
        }
        if self.pages_fetched > 0 {
            record.set_field("pages_fetched", self.pages_fetched.to_string(), page_source);
        }

        record
    }
}
