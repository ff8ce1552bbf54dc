//! Event clustering and synthesis.
//!
//! Eligible articles are grouped into clusters, each cluster gathers
//! historical context from the vector index and encyclopedia background for
//! its named entities, then one brief is written per cluster.

pub mod entities;
pub mod grouping;
pub mod rag;
pub mod synthesis;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use wealthsignal_common::{Article, SynthesizedEvent, Thresholds};
use wealthsignal_store::{DocumentStore, VectorIndex};

use crate::pipeline::workers::WorkerPool;
use crate::traits::{Encyclopedia, IntelligenceService, TextEmbedder};

pub use grouping::Cluster;

pub struct ClusteringDeps<'a> {
    pub intelligence: &'a dyn IntelligenceService,
    pub embedder: &'a dyn TextEmbedder,
    pub store: &'a dyn DocumentStore,
    pub vectors: &'a dyn VectorIndex,
    pub encyclopedia: &'a dyn Encyclopedia,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClusteringReport {
    pub eligible: u32,
    pub clusters: u32,
    pub events: u32,
    pub historical_hits: u32,
    pub entity_pages: u32,
}

/// Articles that may take part in events.
pub fn eligible_for_events(articles: &[Article], thresholds: &Thresholds) -> Vec<Article> {
    articles
        .iter()
        .filter(|a| a.relevance_article.unwrap_or(0) >= thresholds.article_relevance_for_events)
        .cloned()
        .collect()
}

pub async fn cluster_and_synthesize(
    deps: &ClusteringDeps<'_>,
    workers: &WorkerPool,
    enriched: &[Article],
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> (Vec<SynthesizedEvent>, ClusteringReport) {
    let eligible = eligible_for_events(enriched, thresholds);
    let mut report = ClusteringReport {
        eligible: eligible.len() as u32,
        ..Default::default()
    };
    if eligible.is_empty() {
        info!("No articles eligible for events");
        return (Vec::new(), report);
    }

    let clusters = grouping::group_articles(deps.intelligence, &eligible, now.date_naive()).await;
    report.clusters = clusters.len() as u32;

    let records = match deps.vectors.vectors().await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Vector snapshot unavailable, synthesizing without history");
            Vec::new()
        }
    };
    let records = &records;

    let outcomes = workers
        .settle_all("synthesize_event", clusters, |cluster| async move {
            let text = rag::combined_text(&cluster);
            let entities = entities::entity_context(
                deps.intelligence,
                deps.encyclopedia,
                &text,
                thresholds.max_entities_per_cluster,
            )
            .await;
            let historical = match rag::historical_context(
                deps.embedder,
                deps.store,
                records,
                &cluster,
                thresholds.rag_similarity_threshold,
                thresholds.rag_max_historical,
            )
            .await
            {
                Ok(h) => h,
                Err(e) => {
                    warn!(event_key = cluster.event_key.as_str(), error = %e, "Historical context lookup failed");
                    Vec::new()
                }
            };
            let event = synthesis::synthesize(
                deps.intelligence,
                &cluster,
                &historical,
                &entities,
                thresholds.summary_max_words,
                now,
            )
            .await;
            Ok((event, historical.len(), entities.len()))
        })
        .await;

    let mut events = Vec::new();
    for (event, historical, entity_pages) in outcomes.into_iter().filter_map(|o| o.done()) {
        report.historical_hits += historical as u32;
        report.entity_pages += entity_pages as u32;
        if let Some(event) = event {
            events.push(event);
        }
    }
    report.events = events.len() as u32;

    info!(
        eligible = report.eligible,
        clusters = report.clusters,
        events = report.events,
        historical_hits = report.historical_hits,
        entity_pages = report.entity_pages,
        "Clustering and synthesis complete"
    );
    (events, report)
}
