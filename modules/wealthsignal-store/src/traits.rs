use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wealthsignal_common::{
    cosine_similarity, Article, Opportunity, SourceConfig, Subscriber, SynthesizedEvent,
};

use crate::error::Result;

// --- DocumentStore trait ---

/// Keyed document store. Every write is an upsert on the document's natural
/// key, so any write may be retried.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity check used by the pre-flight stage.
    async fn ping(&self) -> Result<()>;

    async fn active_sources(&self) -> Result<Vec<SourceConfig>>;

    /// Record a scrape attempt against a source's health counters.
    async fn record_source_scrape(&self, key: &str, success: bool, at: DateTime<Utc>) -> Result<()>;

    async fn find_articles_by_links(&self, links: &[String]) -> Result<Vec<Article>>;

    async fn find_articles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>>;

    /// Upsert keyed by `link`. A stored id and `created_at` win over the incoming ones.
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    /// Unordered bulk upsert: every article is attempted, failures are reported.
    async fn bulk_upsert_articles(&self, articles: &[Article]) -> BulkWriteReport {
        let mut report = BulkWriteReport::default();
        for article in articles {
            match self.upsert_article(article).await {
                Ok(()) => report.written += 1,
                Err(e) => report.failed.push((article.link.clone(), e.to_string())),
            }
        }
        report
    }

    /// Upsert keyed by `event_key`. Delivery state and identity are preserved
    /// from the stored document.
    async fn upsert_event(&self, event: &SynthesizedEvent) -> Result<UpsertOutcome>;

    /// Upsert keyed by normalized `reach_out_to`, merging into any stored
    /// record. Returns the stored result.
    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<Opportunity>;

    async fn link_opportunity_to_event(&self, reach_out_to: &str, event_id: Uuid) -> Result<()>;

    async fn mark_events_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()>;

    async fn mark_opportunities_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()>;

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>>;

    async fn record_run(&self, run: &RunRecord) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct BulkWriteReport {
    pub written: usize,
    /// `(link, error)` for every article that could not be written.
    pub failed: Vec<(String, String)>,
}

impl BulkWriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What an event upsert left in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: Uuid,
    pub inserted: bool,
    pub emailed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: String,
    pub stats: serde_json::Value,
}

// --- VectorIndex trait ---

/// Article embeddings, written independently of the document store.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert_vector(&self, id: Uuid, vector: &[f32], metadata: serde_json::Value)
        -> Result<()>;

    /// Every stored vector. Nearest-neighbour search runs locally over these.
    async fn vectors(&self) -> Result<Vec<VectorRecord>>;
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ScoredVector {
    pub id: Uuid,
    pub similarity: f64,
    pub metadata: serde_json::Value,
}

/// Records strictly above `threshold` similarity to `query`, most similar
/// first, at most `k` of them. Ids in `exclude` are skipped.
pub fn nearest(
    records: &[VectorRecord],
    query: &[f32],
    threshold: f64,
    k: usize,
    exclude: &HashSet<Uuid>,
) -> Vec<ScoredVector> {
    let mut scored: Vec<ScoredVector> = records
        .iter()
        .filter(|r| !exclude.contains(&r.id))
        .map(|r| ScoredVector {
            id: r.id,
            similarity: cosine_similarity(query, &r.vector),
            metadata: r.metadata.clone(),
        })
        .filter(|s| s.similarity > threshold)
        .collect();
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
