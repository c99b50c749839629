//! Stage orchestrator - drives every target through the staged pipeline
//!
//! This module contains the run loop that coordinates:
//! - Resuming against the store (targets with a verified email are skipped)
//! - Driving per-target state machines concurrently in batches
//! - Checkpointing each batch into the store through a single writer
//! - Run-level cancellation and timeout
//! - Collecting run statistics

use crate::config::Config;
use crate::crawler::Fetcher;
use crate::extract::ExtractRules;
use crate::pipeline::outcome::{StageRecord, TargetOutcome, Transition};
use crate::pipeline::stage::{
    signal_satisfied, Stage, StageContext, StageResult, StageSettings, TargetProgress,
};
use crate::pipeline::stages::{HomepageStage, MultiPageStage, PatternGuessStage};
use crate::pipeline::target::dedupe_targets;
use crate::pipeline::{RunStats, Target};
use crate::state::{SignalSource, TargetState, TargetStatus};
use crate::storage::{EnrichmentStore, MergeMode, RunStatus};
use crate::url::Denylist;
use crate::{EnrichError, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Process every target, even those the store already has an email for
    pub fresh: bool,
    pub merge_mode: MergeMode,
    pub config_hash: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fresh: false,
            merge_mode: MergeMode::FillMissing,
            config_hash: String::new(),
        }
    }
}

/// Where a target goes after a stage, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextStep {
    pub to: TargetState,
    pub reason: &'static str,
    /// Final status when `to` is `Done`
    pub status: Option<TargetStatus>,
}

impl NextStep {
    fn stage(to: TargetState, reason: &'static str) -> Self {
        Self {
            to,
            reason,
            status: None,
        }
    }

    fn done(status: TargetStatus, reason: &'static str) -> Self {
        Self {
            to: TargetState::Done,
            reason,
            status: Some(status),
        }
    }
}

/// Decides the next state after `result`
///
/// # Escalation
///
/// | After | Condition | Next |
/// |-------|-----------|------|
/// | any fetch stage | predicate satisfied | Done (found) |
/// | Stage 1 | homepage unreachable, domain known | Stage 3 |
/// | Stage 1 | homepage unreachable, domain unknown | Done (unreachable) |
/// | Stage 1 | render required, domain known | Stage 3 |
/// | Stage 1 | render required, domain unknown | Done (no signal) |
/// | Stage 1 | otherwise | Stage 2 |
/// | Stage 2 | domain known | Stage 3 |
/// | Stage 2 | domain unknown | Done (no signal) |
/// | Stage 3 | guesses produced | Done (guessed) |
/// | Stage 3 | nothing to guess | Done (no signal) |
pub fn next_step(result: &StageResult, progress: &TargetProgress, domain_known: bool) -> NextStep {
    match result.state {
        TargetState::Stage1Homepage | TargetState::Stage2MultiPage if result.satisfied => {
            NextStep::done(TargetStatus::Found, "required signal found")
        }
        TargetState::Stage1Homepage => {
            let probe = progress.homepage.as_ref();
            let unreachable = probe.map(|p| p.is_unreachable()).unwrap_or(true);
            let render_required = probe.map(|p| p.render_required()).unwrap_or(false);

            match (unreachable, render_required, domain_known) {
                (true, _, true) => NextStep::stage(
                    TargetState::Stage3PatternGuess,
                    "homepage unreachable, skipping multi-page crawl",
                ),
                (true, _, false) => {
                    NextStep::done(TargetStatus::Unreachable, "homepage unreachable and domain unknown")
                }
                (false, true, true) => NextStep::stage(
                    TargetState::Stage3PatternGuess,
                    "site requires rendering, skipping multi-page crawl",
                ),
                (false, true, false) => {
                    NextStep::done(TargetStatus::NoSignal, "site requires rendering and domain unknown")
                }
                (false, false, _) => NextStep::stage(
                    TargetState::Stage2MultiPage,
                    "required signal missing after homepage",
                ),
            }
        }
        TargetState::Stage2MultiPage if domain_known => NextStep::stage(
            TargetState::Stage3PatternGuess,
            "required signal missing after multi-page crawl",
        ),
        TargetState::Stage2MultiPage => {
            NextStep::done(TargetStatus::NoSignal, "all options exhausted, domain unknown")
        }
        _ if result.satisfied => NextStep::done(TargetStatus::Guessed, "pattern guess produced"),
        _ => NextStep::done(TargetStatus::NoSignal, "all options exhausted"),
    }
}

/// One target's state machine
struct TargetRun {
    state: TargetState,
    outcome: TargetOutcome,
}

impl TargetRun {
    fn new(target: &Target) -> Self {
        Self {
            state: TargetState::NotStarted,
            outcome: TargetOutcome::new(target.clone(), TargetStatus::NoSignal),
        }
    }

    fn transition(&mut self, to: TargetState, reason: &str) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(EnrichError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        tracing::info!(
            entity_id = %self.outcome.target.entity_id,
            from = %self.state,
            to = %to,
            reason,
            "Stage transition"
        );
        self.outcome.transitions.push(Transition {
            from: self.state,
            to,
            reason: reason.to_string(),
        });
        self.state = to;
        self.outcome.final_state = to;
        Ok(())
    }

    fn finish(mut self, status: TargetStatus) -> TargetOutcome {
        self.outcome.status = status;
        self.outcome
    }
}

/// Main orchestrator structure
pub struct Orchestrator {
    fetcher: Fetcher,
    rules: ExtractRules,
    settings: StageSettings,
    stages: Vec<Box<dyn Stage>>,
    worker_pool_size: usize,
    checkpoint_every: usize,
    run_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Creates an orchestrator for `config`
    ///
    /// Cancelling `cancel` stops new fetches; fetches already in flight run
    /// to completion or timeout.
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let fetcher = Fetcher::from_config(config, cancel.clone())?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Creates an orchestrator around an existing fetcher
    pub fn with_fetcher(config: &Config, fetcher: Fetcher) -> Self {
        let enrichment = &config.enrichment;
        let rules = ExtractRules {
            denylist: Denylist::with_entries(&config.denylist),
            max_links: enrichment.max_links_per_page,
            ..ExtractRules::default()
        };

        let cancel = fetcher.cancellation().clone();

        Self {
            fetcher,
            rules,
            settings: StageSettings::from_config(enrichment),
            stages: vec![
                Box::new(HomepageStage),
                Box::new(MultiPageStage),
                Box::new(PatternGuessStage),
            ],
            worker_pool_size: enrichment.worker_pool_size.max(1),
            checkpoint_every: enrichment.checkpoint_every.max(1),
            run_timeout: enrichment.run_timeout_seconds.map(Duration::from_secs),
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn stage_for(&self, state: TargetState) -> Option<&dyn Stage> {
        self.stages
            .iter()
            .find(|stage| stage.state() == state)
            .map(|stage| stage.as_ref())
    }

    /// Runs one target through the pipeline
    pub async fn enrich_target(&self, target: &Target) -> Result<TargetOutcome> {
        let mut run = TargetRun::new(target);

        if self.cancel.is_cancelled() {
            return Ok(run.finish(TargetStatus::Cancelled));
        }

        if target.url().is_none() {
            run.transition(TargetState::Done, "seed URL could not be parsed")?;
            return Ok(run.finish(TargetStatus::InvalidSeed));
        }

        let mut progress = TargetProgress::default();
        let mut next = NextStep::stage(TargetState::Stage1Homepage, "starting enrichment");

        loop {
            run.transition(next.to, next.reason)?;
            if run.state.is_terminal() {
                run.outcome.signals = progress.signals;
                run.outcome.pages_fetched = progress.pages_fetched;
                return Ok(run.finish(next.status.unwrap_or(TargetStatus::NoSignal)));
            }

            let Some(stage) = self.stage_for(run.state) else {
                return Err(EnrichError::InvalidTransition {
                    from: run.state,
                    to: run.state,
                });
            };
            let ctx = StageContext {
                fetcher: &self.fetcher,
                rules: &self.rules,
                settings: &self.settings,
                progress: &progress,
            };
            let result = stage.run(target, &ctx).await;

            run.outcome.stages.push(StageRecord {
                state: result.state,
                satisfied: result.satisfied,
            });
            run.outcome.fetches.extend(result.fetches.iter().cloned());

            if result.was_cancelled() {
                tracing::info!(
                    entity_id = %target.entity_id,
                    stage = %result.state,
                    "Target cancelled"
                );
                return Ok(run.finish(TargetStatus::Cancelled));
            }

            self.absorb(&mut run.outcome, &mut progress, &result, target);
            next = next_step(&result, &progress, target.domain().is_some());
        }
    }

    /// Folds a stage result into the target's progress and outcome
    fn absorb(
        &self,
        outcome: &mut TargetOutcome,
        progress: &mut TargetProgress,
        result: &StageResult,
        target: &Target,
    ) {
        let source = match result.state {
            TargetState::Stage1Homepage => Some(SignalSource::Stage1),
            TargetState::Stage2MultiPage => Some(SignalSource::Stage2),
            _ => None,
        };

        if let Some(source) = source {
            if outcome.email_source.is_none() && result.signals.has_email() {
                outcome.email_source = Some(source);
            }
            // The stage that met the predicate owns the email provenance
            let before = signal_satisfied(
                self.settings.required_signal,
                &progress.signals,
                target.domain(),
            );
            if result.satisfied && !before && result.signals.has_email() {
                outcome.email_source = Some(source);
            }
        }

        if let Some(probe) = &result.homepage {
            outcome.classification = probe.classification.clone();
            outcome.render_required = probe.render_required();
            progress.homepage = Some(probe.clone());
        }

        progress.pages_fetched += result.pages_fetched();
        progress.signals.union(result.signals.clone());
        outcome.guessed_emails.extend(result.guessed_emails.iter().cloned());
    }

    /// Enriches `targets` and merges the results into `store`
    ///
    /// Targets are processed in batches of `checkpoint-every`; each batch runs
    /// with up to `worker-pool-size` targets in flight and is written to the
    /// store once it completes. Cancelled targets are not written.
    pub async fn run<S: EnrichmentStore>(
        &self,
        mut targets: Vec<Target>,
        store: &mut S,
        options: &RunOptions,
    ) -> Result<RunStats> {
        let mut stats = RunStats {
            started_at: Some(Utc::now()),
            targets_total: targets.len() as u64,
            ..RunStats::default()
        };

        stats.duplicate_targets = dedupe_targets(&mut targets) as u64;

        if !options.fresh {
            let done: HashSet<String> = store.verified_email_ids()?.into_iter().collect();
            let before = targets.len();
            targets.retain(|target| !done.contains(&target.entity_id));
            stats.targets_skipped = (before - targets.len()) as u64;
            if stats.targets_skipped > 0 {
                tracing::info!(
                    "Resuming: skipping {} targets that already have a verified email",
                    stats.targets_skipped
                );
            }
        }

        let run_id = store.create_run(&options.config_hash)?;
        stats.run_id = Some(run_id);
        tracing::info!("Starting enrichment run {} with {} targets", run_id, targets.len());

        let watchdog = self.run_timeout.map(|timeout| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        tracing::warn!("Run timeout of {:?} reached, cancelling", timeout);
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let result = self.run_batches(&targets, store, options, &mut stats).await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        stats.cancelled = self.cancel.is_cancelled();
        stats.finished_at = Some(Utc::now());

        let status = match (&result, stats.cancelled) {
            (Err(_), _) => RunStatus::Failed,
            (Ok(()), true) => RunStatus::Interrupted,
            (Ok(()), false) => RunStatus::Completed,
        };
        store.finish_run(run_id, status, &stats.to_json()?)?;
        result?;

        tracing::info!(
            "Run {} {}: {} processed, {} skipped, {} cancelled",
            run_id,
            status.to_db_string(),
            stats.targets_processed,
            stats.targets_skipped,
            stats.targets_cancelled
        );

        Ok(stats)
    }

    async fn run_batches<S: EnrichmentStore>(
        &self,
        targets: &[Target],
        store: &mut S,
        options: &RunOptions,
        stats: &mut RunStats,
    ) -> Result<()> {
        for batch in targets.chunks(self.checkpoint_every) {
            if self.cancel.is_cancelled() {
                stats.targets_cancelled += batch.len() as u64;
                continue;
            }

            let outcomes: Vec<Result<TargetOutcome>> = stream::iter(batch)
                .map(|target| self.enrich_target(target))
                .buffer_unordered(self.worker_pool_size)
                .collect()
                .await;

            let mut records = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                let outcome = outcome?;
                stats.record_outcome(&outcome);
                if outcome.status != TargetStatus::Cancelled {
                    records.push(outcome.to_record());
                }
            }

            // Completion order varies; write in a stable order
            records.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
            let summary = store.upsert(&records, options.merge_mode)?;
            stats.records_written += (summary.inserted + summary.updated) as u64;
            stats.checkpoints += 1;

            tracing::info!(
                "Checkpoint {}: {} records ({} new, {} updated, {} unchanged), {}/{} targets done",
                stats.checkpoints,
                records.len(),
                summary.inserted,
                summary.updated,
                summary.unchanged,
                stats.targets_processed,
                targets.len()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{FetchMethod, FetchStatus, SiteClassification};
    use crate::pipeline::stage::HomepageProbe;

    fn probe(status: FetchStatus, method: Option<FetchMethod>) -> HomepageProbe {
        HomepageProbe {
            status,
            http_status_code: None,
            final_url: None,
            classification: method.map(|method| SiteClassification {
                method,
                confidence: 0.9,
                reasons: Vec::new(),
                content_quality: 0,
                js_risk: 0,
                blocked: false,
            }),
        }
    }

    fn after(state: TargetState, satisfied: bool) -> StageResult {
        let mut result = StageResult::new(state);
        result.satisfied = satisfied;
        result
    }

    fn progress_with(probe: HomepageProbe) -> TargetProgress {
        TargetProgress {
            homepage: Some(probe),
            ..TargetProgress::default()
        }
    }

    #[test]
    fn test_satisfied_stage_never_escalates() {
        let progress = progress_with(probe(FetchStatus::Success, None));
        for state in [TargetState::Stage1Homepage, TargetState::Stage2MultiPage] {
            let step = next_step(&after(state, true), &progress, true);
            assert_eq!(step.to, TargetState::Done);
            assert_eq!(step.status, Some(TargetStatus::Found));
        }
    }

    #[test]
    fn test_homepage_without_signal_escalates_to_stage2() {
        let progress = progress_with(probe(FetchStatus::Success, None));
        let step = next_step(&after(TargetState::Stage1Homepage, false), &progress, true);
        assert_eq!(step.to, TargetState::Stage2MultiPage);
    }

    #[test]
    fn test_http_error_homepage_still_tries_stage2() {
        let progress = progress_with(probe(FetchStatus::HttpError, None));
        let step = next_step(&after(TargetState::Stage1Homepage, false), &progress, true);
        assert_eq!(step.to, TargetState::Stage2MultiPage);
    }

    #[test]
    fn test_unreachable_homepage() {
        let progress = progress_with(probe(FetchStatus::Timeout, None));
        let result = after(TargetState::Stage1Homepage, false);

        assert_eq!(next_step(&result, &progress, true).to, TargetState::Stage3PatternGuess);

        let step = next_step(&result, &progress, false);
        assert_eq!(step.to, TargetState::Done);
        assert_eq!(step.status, Some(TargetStatus::Unreachable));
    }

    #[test]
    fn test_render_required_skips_stage2() {
        let progress = progress_with(probe(FetchStatus::Success, Some(FetchMethod::RenderRequired)));
        let result = after(TargetState::Stage1Homepage, false);

        assert_eq!(next_step(&result, &progress, true).to, TargetState::Stage3PatternGuess);
        assert_eq!(
            next_step(&result, &progress, false).status,
            Some(TargetStatus::NoSignal)
        );
    }

    #[test]
    fn test_stage2_exhausted() {
        let progress = TargetProgress::default();
        let result = after(TargetState::Stage2MultiPage, false);

        assert_eq!(next_step(&result, &progress, true).to, TargetState::Stage3PatternGuess);
        assert_eq!(
            next_step(&result, &progress, false).status,
            Some(TargetStatus::NoSignal)
        );
    }

    #[test]
    fn test_stage3_outcomes() {
        let progress = TargetProgress::default();
        assert_eq!(
            next_step(&after(TargetState::Stage3PatternGuess, true), &progress, true).status,
            Some(TargetStatus::Guessed)
        );
        assert_eq!(
            next_step(&after(TargetState::Stage3PatternGuess, false), &progress, true).status,
            Some(TargetStatus::NoSignal)
        );
    }

    #[test]
    fn test_only_terminal_steps_carry_a_status() {
        let probes = [
            probe(FetchStatus::Success, None),
            probe(FetchStatus::HttpError, None),
            probe(FetchStatus::NetworkError, None),
            probe(FetchStatus::Success, Some(FetchMethod::RenderRequired)),
        ];
        let states = [
            TargetState::Stage1Homepage,
            TargetState::Stage2MultiPage,
            TargetState::Stage3PatternGuess,
        ];

        for homepage in probes {
            let progress = progress_with(homepage);
            for state in states {
                for satisfied in [true, false] {
                    for domain_known in [true, false] {
                        let step = next_step(&after(state, satisfied), &progress, domain_known);
                        assert_eq!(step.to.is_terminal(), step.status.is_some(), "{:?}", step);
                        assert!(state.can_transition_to(step.to), "{:?} -> {:?}", state, step.to);
                    }
                }
            }
        }
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut run = TargetRun::new(&Target::new(Some("acme"), "acme.test"));
        run.transition(TargetState::Stage1Homepage, "start").unwrap();
        run.transition(TargetState::Stage2MultiPage, "escalate").unwrap();

        let err = run.transition(TargetState::Stage1Homepage, "back").unwrap_err();
        assert!(matches!(err, EnrichError::InvalidTransition { .. }));
        assert_eq!(run.outcome.transitions.len(), 2);
    }
}
