//! The five-stage run driver.
//!
//! pre-flight → scrape & filter → assess & enrich → cluster & synthesize →
//! commit & notify. Each stage takes the run payload and hands it back with
//! a proceed flag. Only infrastructure failures end a run with an error.

pub mod payload;
pub mod source_cache;
pub mod stats;
pub mod workers;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;
use wealthsignal_common::thresholds::DEFAULT_CONCURRENCY;
use wealthsignal_common::{EnrichmentMethod, Environment, Thresholds, WealthSignalError};
use wealthsignal_store::{DocumentStore, RetryPolicy, RunRecord, VectorIndex};

use crate::assessment::assess_headlines;
use crate::clustering::{self, ClusteringDeps};
use crate::commit::commit;
use crate::contacts::extract_opportunities;
use crate::enrichment::{Enricher, EnrichmentState};
use crate::extraction::{dedupe_across_sources, scrape_source};
use crate::freshness::{filter_fresh, FreshnessMode};
use crate::notify::{
    dispatch, FeedItem, NoopSupervisor, NotificationChannel, RealtimeFeed, SupervisorAlert,
    SupervisorBackend,
};
use crate::prompts;
use crate::traits::{
    Encyclopedia, IntelligenceRequest, IntelligenceService, IntelligenceTask, PageFetcher,
    TextEmbedder, WebSearcher,
};

use payload::{RunPayload, StageOutcome};
use source_cache::SourceCache;
use stats::{RunStats, SourceHealth};
use workers::{TaskOutcome, WorkerPool};

/// Long-lived collaborators for pipeline runs.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub store: Arc<dyn DocumentStore>,
    pub vectors: Arc<dyn VectorIndex>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub searcher: Arc<dyn WebSearcher>,
    pub intelligence: Arc<dyn IntelligenceService>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub encyclopedia: Arc<dyn Encyclopedia>,
    #[builder(default)]
    pub channels: Vec<Arc<dyn NotificationChannel>>,
    #[builder(default = Arc::new(NoopSupervisor))]
    pub supervisor: Arc<dyn SupervisorBackend>,
    #[builder(default)]
    pub realtime: RealtimeFeed,
    #[builder(default = Environment::Development)]
    pub environment: Environment,
    #[builder(default)]
    pub thresholds: Thresholds,
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    #[builder(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Reprocess links that are already stored.
    pub refresh: bool,
    /// Only scrape sources whose name or key matches one of these.
    pub source_filter: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Scraping produced nothing fresh; later stages never ran.
    NothingNew,
    Committed,
    /// At least one write failed after retries. Notifications were aborted.
    Failed,
    /// The run was cancelled at a stage boundary before commit.
    Cancelled,
}

impl CommitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStatus::NothingNew => "nothing_new",
            CommitStatus::Committed => "committed",
            CommitStatus::Failed => "commit_failed",
            CommitStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub stats: RunStats,
    pub commit: CommitStatus,
    pub notified: bool,
}

impl RunOutcome {
    pub fn committed(&self) -> bool {
        self.commit == CommitStatus::Committed
    }
}

/// An infrastructure failure with the stats gathered before it.
struct StageFailure {
    error: WealthSignalError,
    stats: RunStats,
}

impl StageFailure {
    fn at(stats: &RunStats) -> impl FnOnce(WealthSignalError) -> StageFailure {
        let stats = stats.clone();
        move |error| StageFailure { error, stats }
    }
}

pub struct Pipeline {
    deps: PipelineDeps,
    options: RunOptions,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, options: RunOptions) -> Self {
        Self {
            deps,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag stops new work; in-flight tasks settle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn workers(&self) -> WorkerPool {
        WorkerPool::new(self.deps.concurrency, self.cancelled.clone())
    }

    fn is_cancelled(&self) -> bool {
        let cancelled = self.cancelled.load(Ordering::SeqCst);
        if cancelled {
            warn!("Run cancelled, stopping before next stage");
        }
        cancelled
    }

    /// Run the pipeline once. The fetch session is released and a run record
    /// written on every exit path. A cancelled run is an `Ok` outcome with
    /// `CommitStatus::Cancelled`; only infrastructure failures are errors.
    pub async fn run(&self) -> Result<RunOutcome, WealthSignalError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, refresh = self.options.refresh, "Pipeline run starting");

        let result = self.run_stages(RunPayload::new(run_id, started_at)).await;

        self.deps.fetcher.close().await;

        let (outcome_label, stats) = match &result {
            Ok(outcome) => (outcome.commit.as_str(), &outcome.stats),
            Err(failure) => ("failed", &failure.stats),
        };
        let record = RunRecord {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcome: outcome_label.to_string(),
            stats: serde_json::to_value(stats).unwrap_or(Value::Null),
        };
        if let Err(e) = self.deps.store.record_run(&record).await {
            warn!(run_id = %run_id, error = %e, "Failed to record run");
        }

        match result {
            Ok(outcome) if outcome.commit == CommitStatus::Cancelled => {
                info!("{}", outcome.stats);
                Ok(outcome)
            }
            Ok(outcome) => {
                info!("{}", outcome.stats);
                if let Err(e) = self.deps.supervisor.send_digest(&outcome.stats).await {
                    warn!(error = %e, "Failed to send supervisor digest");
                }
                Ok(outcome)
            }
            Err(StageFailure { error: e, .. }) => {
                error!(run_id = %run_id, error = %e, "Pipeline run failed");
                let alert = SupervisorAlert::error("Pipeline run failed", e.to_string());
                if let Err(e) = self.deps.supervisor.alert(&alert).await {
                    warn!(error = %e, "Failed to send supervisor alert");
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, payload: RunPayload) -> Result<RunOutcome, StageFailure> {
        self.preflight().await.map_err(StageFailure::at(&payload.stats))?;
        if self.is_cancelled() {
            return Ok(finish(payload, CommitStatus::Cancelled, false));
        }

        let sources = self.load_sources().await.map_err(StageFailure::at(&payload.stats))?;
        let source_cache = SourceCache::new(&sources);

        let on_error = StageFailure::at(&payload.stats);
        let stage = self.scrape_and_filter(payload, sources).await.map_err(on_error)?;
        if !stage.proceed {
            info!("Nothing fresh to process, ending run");
            return Ok(finish(stage.payload, CommitStatus::NothingNew, false));
        }
        if self.is_cancelled() {
            return Ok(finish(stage.payload, CommitStatus::Cancelled, false));
        }

        let on_error = StageFailure::at(&stage.payload.stats);
        let stage = self
            .assess_and_enrich(stage.payload, &source_cache)
            .await
            .map_err(on_error)?;
        if self.is_cancelled() {
            return Ok(finish(stage.payload, CommitStatus::Cancelled, false));
        }

        let payload = if stage.proceed {
            let on_error = StageFailure::at(&stage.payload.stats);
            let stage = self.cluster_and_synthesize(stage.payload).await.map_err(on_error)?;
            if self.is_cancelled() {
                return Ok(finish(stage.payload, CommitStatus::Cancelled, false));
            }
            stage.payload
        } else {
            info!("No enriched articles, skipping clustering");
            stage.payload
        };

        let (payload, commit, notified) = self.commit_and_notify(payload).await;
        Ok(finish(payload, commit, notified))
    }

    // -----------------------------------------------------------------------
    // Stage 1: pre-flight
    // -----------------------------------------------------------------------

    async fn preflight(&self) -> Result<(), WealthSignalError> {
        self.deps
            .store
            .ping()
            .await
            .map_err(|e| WealthSignalError::Preflight(format!("document store unreachable: {e}")))?;

        let request = IntelligenceRequest::new(
            IntelligenceTask::Preflight,
            prompts::PREFLIGHT_SYSTEM,
            prompts::PREFLIGHT_USER,
        );
        let response = self
            .deps
            .intelligence
            .complete_json(&request)
            .await
            .map_err(|e| WealthSignalError::Preflight(format!("intelligence service unreachable: {e:#}")))?;
        if response.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(WealthSignalError::Preflight(format!(
                "intelligence service sanity check returned {response}"
            )));
        }
        info!("Pre-flight checks passed");
        Ok(())
    }

    async fn load_sources(&self) -> Result<Vec<wealthsignal_common::SourceConfig>, WealthSignalError> {
        let sources = self
            .deps
            .store
            .active_sources()
            .await
            .map_err(|e| WealthSignalError::Store(format!("loading sources: {e}")))?;
        if self.options.source_filter.is_empty() {
            return Ok(sources);
        }
        let filter = &self.options.source_filter;
        Ok(sources
            .into_iter()
            .filter(|s| {
                filter
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&s.name) || f.eq_ignore_ascii_case(&s.key))
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Stage 2: scrape & filter
    // -----------------------------------------------------------------------

    async fn scrape_and_filter(
        &self,
        mut payload: RunPayload,
        sources: Vec<wealthsignal_common::SourceConfig>,
    ) -> Result<StageOutcome, WealthSignalError> {
        let fetcher = self.deps.fetcher.as_ref();
        let thresholds = &self.deps.thresholds;
        let now = Utc::now();
        info!(sources = sources.len(), "Scraping sources");

        let outcomes = self
            .workers()
            .settle_all("scrape_source", sources.clone(), |source| async move {
                Ok(scrape_source(fetcher, &source, thresholds).await)
            })
            .await;

        let mut candidates = Vec::new();
        for (outcome, source) in outcomes.into_iter().zip(&sources) {
            let health = match outcome {
                TaskOutcome::Done(scrape) => {
                    let health = SourceHealth {
                        key: scrape.source_key.clone(),
                        name: scrape.source_name.clone(),
                        headlines: scrape.headlines.len() as u32,
                        success: scrape.succeeded(),
                        error: scrape.error.clone(),
                    };
                    candidates.extend(scrape.headlines);
                    health
                }
                TaskOutcome::Failed(reason) => SourceHealth {
                    key: source.key.clone(),
                    name: source.name.clone(),
                    headlines: 0,
                    success: false,
                    error: Some(reason),
                },
                TaskOutcome::Skipped => continue,
            };
            if let Err(e) = self
                .deps
                .store
                .record_source_scrape(&health.key, health.success, now)
                .await
            {
                warn!(source = health.key.as_str(), error = %e, "Failed to record source health");
            }
            payload.stats.source_health.push(health);
        }

        let (candidates, collapsed) = dedupe_across_sources(candidates);
        payload.stats.headlines_scraped = candidates.len() as u32;
        payload.stats.cross_source_duplicates = collapsed as u32;

        let mode = if self.options.refresh {
            FreshnessMode::Refresh
        } else {
            FreshnessMode::Standard
        };
        let fresh = filter_fresh(
            self.deps.store.as_ref(),
            self.deps.embedder.as_ref(),
            candidates,
            mode,
            now,
        )
        .await
        .map_err(|e| WealthSignalError::Store(format!("{e:#}")))?;
        payload.stats.fresh_articles = fresh.new_count as u32;
        payload.stats.refreshed_articles = fresh.refreshed_count as u32;

        let skeletal: Vec<_> = fresh.new_articles().cloned().collect();
        if !skeletal.is_empty() {
            let report = self.deps.store.bulk_upsert_articles(&skeletal).await;
            for (link, err) in &report.failed {
                warn!(link = link.as_str(), error = err.as_str(), "Skeletal article write failed");
            }
        }

        info!(
            scraped = payload.stats.headlines_scraped,
            fresh = payload.stats.fresh_articles,
            refreshed = payload.stats.refreshed_articles,
            "Scrape and filter complete"
        );
        payload.articles_for_pipeline = fresh.articles;
        if payload.articles_for_pipeline.is_empty() {
            Ok(StageOutcome::stop(payload))
        } else {
            Ok(StageOutcome::proceed(payload))
        }
    }

    // -----------------------------------------------------------------------
    // Stage 3: assess & enrich
    // -----------------------------------------------------------------------

    async fn assess_and_enrich(
        &self,
        mut payload: RunPayload,
        sources: &SourceCache,
    ) -> Result<StageOutcome, WealthSignalError> {
        let thresholds = &self.deps.thresholds;
        let workers = self.workers();

        let (assessed, report) = assess_headlines(
            self.deps.intelligence.as_ref(),
            &workers,
            payload.articles_for_pipeline.clone(),
            thresholds.assessment_batch_size,
        )
        .await;
        payload.stats.assessment_batches = report.batches;
        payload.stats.assessment_batches_failed = report.failed_batches;

        let relevant: Vec<_> = assessed
            .iter()
            .filter(|a| a.relevance_headline >= thresholds.headline_relevance_for_enrichment)
            .cloned()
            .collect();
        payload.stats.relevant_headlines = relevant.len() as u32;
        payload.assessed_candidates = assessed;
        info!(relevant = relevant.len(), "Enriching relevant headlines");

        let enricher = Enricher {
            fetcher: self.deps.fetcher.as_ref(),
            searcher: self.deps.searcher.as_ref(),
            intelligence: self.deps.intelligence.as_ref(),
            sources,
            thresholds,
        };
        let enricher = &enricher;
        let outcomes = workers
            .settle_all("enrich_article", relevant, |article| async move {
                Ok(enricher.enrich(article).await)
            })
            .await;

        for outcome in outcomes {
            match outcome {
                TaskOutcome::Done(result) if result.final_state == EnrichmentState::Done => {
                    match result.method() {
                        Some(EnrichmentMethod::Direct) => payload.stats.enriched_direct += 1,
                        Some(EnrichmentMethod::Verified) => payload.stats.enriched_verified += 1,
                        Some(EnrichmentMethod::Salvaged) => payload.stats.enriched_salvaged += 1,
                        None => {}
                    }
                    payload
                        .full_article_map
                        .insert(result.article.id, result.article.clone());
                    payload.enriched_articles.push(result.article);
                }
                TaskOutcome::Done(_) => payload.stats.enrichment_dropped += 1,
                TaskOutcome::Failed(_) | TaskOutcome::Skipped => payload.stats.enrichment_failed += 1,
            }
        }

        let (opportunities, contacts) = extract_opportunities(
            self.deps.intelligence.as_ref(),
            self.deps.searcher.as_ref(),
            &workers,
            &payload.enriched_articles,
            thresholds,
            Utc::now(),
        )
        .await;
        payload.stats.opportunities_found = opportunities.len() as u32;
        payload.stats.contacts_rejected = contacts.rejected_stop_list + contacts.rejected_wealth;
        payload.opportunities_to_save = opportunities;

        if payload.enriched_articles.is_empty() {
            Ok(StageOutcome::stop(payload))
        } else {
            Ok(StageOutcome::proceed(payload))
        }
    }

    // -----------------------------------------------------------------------
    // Stage 4: cluster & synthesize
    // -----------------------------------------------------------------------

    async fn cluster_and_synthesize(&self, mut payload: RunPayload) -> Result<StageOutcome, WealthSignalError> {
        let deps = ClusteringDeps {
            intelligence: self.deps.intelligence.as_ref(),
            embedder: self.deps.embedder.as_ref(),
            store: self.deps.store.as_ref(),
            vectors: self.deps.vectors.as_ref(),
            encyclopedia: self.deps.encyclopedia.as_ref(),
        };
        let (events, report) = clustering::cluster_and_synthesize(
            &deps,
            &self.workers(),
            &payload.enriched_articles,
            &self.deps.thresholds,
            Utc::now(),
        )
        .await;
        payload.stats.clusters = report.clusters;
        payload.stats.events_synthesized = events.len() as u32;
        payload.synthesized_events_to_save = events;
        Ok(StageOutcome::proceed(payload))
    }

    // -----------------------------------------------------------------------
    // Stage 5: commit & notify
    // -----------------------------------------------------------------------

    /// Returns the payload with the commit status and whether notification ran.
    async fn commit_and_notify(&self, mut payload: RunPayload) -> (RunPayload, CommitStatus, bool) {
        let thresholds = &self.deps.thresholds;
        let articles = payload.articles_to_commit();
        let relevant: Vec<FeedItem> = payload
            .enriched_articles
            .iter()
            .filter(|a| a.best_relevance() >= thresholds.article_relevance_for_events)
            .map(FeedItem::from)
            .collect();

        let report = match commit(
            self.deps.store.as_ref(),
            self.deps.vectors.as_ref(),
            &self.deps.retry,
            articles,
            std::mem::take(&mut payload.synthesized_events_to_save),
            std::mem::take(&mut payload.opportunities_to_save),
            thresholds,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => {
                error!(run_id = %payload.run_id, error = %e, "Commit failed, notifications aborted");
                let alert = SupervisorAlert::error("Commit failed", e.to_string());
                if let Err(e) = self.deps.supervisor.alert(&alert).await {
                    warn!(error = %e, "Failed to send supervisor alert");
                }
                return (payload, CommitStatus::Failed, false);
            }
        };
        payload.stats.articles_committed = report.articles_written as u32;
        payload.stats.events_committed = report.events.len() as u32;
        payload.stats.opportunities_committed = report.opportunities.len() as u32;

        for event in &report.events {
            self.deps.realtime.publish(FeedItem::Event(event.clone()));
        }
        for item in relevant {
            self.deps.realtime.publish(item);
        }

        let events: Vec<_> = report.unemailed_events().cloned().collect();
        let opportunities: Vec<_> = report.unemailed_opportunities().cloned().collect();
        let notified = match dispatch(
            self.deps.store.as_ref(),
            &self.deps.channels,
            self.deps.environment,
            &events,
            &opportunities,
            &report.opportunity_countries,
            Utc::now(),
        )
        .await
        {
            Ok(dispatched) => {
                payload.stats.notifications_sent = dispatched.sent;
                payload.stats.notifications_skipped = dispatched.skipped;
                payload.stats.notifications_failed = dispatched.failed;
                payload.synthesized_events_to_save = report.events;
                payload.opportunities_to_save = report.opportunities;
                true
            }
            Err(e) => {
                warn!(error = %e, "Notification fan-out failed");
                payload.synthesized_events_to_save = report.events;
                payload.opportunities_to_save = report.opportunities;
                false
            }
        };
        (payload, CommitStatus::Committed, notified)
    }
}

fn finish(payload: RunPayload, commit: CommitStatus, notified: bool) -> RunOutcome {
    RunOutcome {
        run_id: payload.run_id,
        stats: payload.stats,
        commit,
        notified,
    }
}
