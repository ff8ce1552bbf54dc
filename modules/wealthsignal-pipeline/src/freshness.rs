use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use wealthsignal_common::{Article, CandidateHeadline};
use wealthsignal_store::DocumentStore;

use crate::traits::TextEmbedder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreshnessMode {
    /// Only links the store has never seen.
    #[default]
    Standard,
    /// Links already stored are reprocessed under their stored identity.
    Refresh,
}

#[derive(Debug, Default)]
pub struct FreshnessResult {
    pub articles: Vec<Article>,
    /// Skeletal records created for unseen links.
    pub new_count: usize,
    /// Stored documents pulled back in for reprocessing.
    pub refreshed_count: usize,
    new_links: HashSet<String>,
}

impl FreshnessResult {
    /// Articles that are new to the store and need a skeletal write.
    pub fn new_articles(&self) -> impl Iterator<Item = &Article> {
        self.articles
            .iter()
            .filter(|a| self.new_links.contains(&a.link))
    }
}

/// Split candidates into the ones that should enter this run.
///
/// New candidates become skeletal articles with a fresh id. Every article
/// entering the pipeline carries a headline embedding when the embedder is
/// reachable; an embedding failure is logged and leaves `embedding` empty.
pub async fn filter_fresh(
    store: &dyn DocumentStore,
    embedder: &dyn TextEmbedder,
    candidates: Vec<CandidateHeadline>,
    mode: FreshnessMode,
    now: DateTime<Utc>,
) -> Result<FreshnessResult> {
    if candidates.is_empty() {
        return Ok(FreshnessResult::default());
    }

    let links: Vec<String> = candidates.iter().map(|c| c.link.clone()).collect();
    let existing: HashMap<String, Article> = store
        .find_articles_by_links(&links)
        .await
        .context("Failed to look up existing articles by link")?
        .into_iter()
        .map(|a| (a.link.clone(), a))
        .collect();

    let mut result = FreshnessResult::default();
    for candidate in candidates {
        match (existing.get(&candidate.link), mode) {
            (None, _) => {
                result.new_links.insert(candidate.link.clone());
                result.articles.push(Article::skeletal(candidate, now));
                result.new_count += 1;
            }
            (Some(stored), FreshnessMode::Refresh) => {
                result.articles.push(stored.clone());
                result.refreshed_count += 1;
            }
            (Some(_), FreshnessMode::Standard) => {}
        }
    }

    attach_embeddings(embedder, &mut result.articles).await;

    info!(
        new = result.new_count,
        refreshed = result.refreshed_count,
        seen = existing.len(),
        mode = ?mode,
        "Freshness filter complete"
    );
    Ok(result)
}

async fn attach_embeddings(embedder: &dyn TextEmbedder, articles: &mut [Article]) {
    let missing: Vec<usize> = articles
        .iter()
        .enumerate()
        .filter(|(_, a)| a.embedding.as_ref().map_or(true, |e| e.is_empty()))
        .map(|(i, _)| i)
        .collect();
    if missing.is_empty() {
        return;
    }

    let texts: Vec<String> = missing.iter().map(|&i| articles[i].headline.clone()).collect();
    match embedder.embed_batch(texts).await {
        Ok(vectors) if vectors.len() == missing.len() => {
            for (i, vector) in missing.into_iter().zip(vectors) {
                articles[i].embedding = Some(vector);
            }
        }
        Ok(vectors) => {
            warn!(expected = missing.len(), got = vectors.len(), "Embedding batch size mismatch, skipping embeddings");
        }
        Err(e) => {
            warn!(error = %e, count = missing.len(), "Headline embedding failed, continuing without embeddings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use wealthsignal_store::MemoryStore;

    #[tokio::test]
    async fn standard_mode_excludes_seen_links() {
        let seen = stored_article("https://borsen.dk/seen", "Kendt historie om salg af rederi", 70);
        let store = MemoryStore::new().with_articles(vec![seen]);
        let candidates = vec![
            candidate("https://borsen.dk/seen", "Kendt historie om salg af rederi"),
            candidate("https://borsen.dk/new", "Ny historie om familie der sælger"),
        ];

        let result = filter_fresh(&store, &FixedEmbedder::new(), candidates, FreshnessMode::Standard, Utc::now())
            .await
            .unwrap();

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].link, "https://borsen.dk/new");
        assert_eq!(result.articles[0].relevance_headline, 0);
        assert_eq!(result.articles[0].assessment_headline, wealthsignal_common::AWAITING_ASSESSMENT);
        assert!(result.articles[0].embedding.is_some());
        assert_eq!(result.new_articles().count(), 1);
    }

    #[tokio::test]
    async fn refresh_mode_substitutes_stored_identity() {
        let seen = stored_article("https://borsen.dk/seen", "Kendt historie om salg af rederi", 70);
        let seen_id = seen.id;
        let store = MemoryStore::new().with_articles(vec![seen]);

        let result = filter_fresh(
            &store,
            &FixedEmbedder::new(),
            vec![candidate("https://borsen.dk/seen", "Kendt historie om salg af rederi")],
            FreshnessMode::Refresh,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(result.articles.len(), 1);
        assert_eq!(result.articles[0].id, seen_id);
        assert_eq!(result.articles[0].relevance_headline, 70);
        assert_eq!(result.refreshed_count, 1);
        assert_eq!(result.new_articles().count(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_is_not_fatal() {
        let store = MemoryStore::new();
        let result = filter_fresh(
            &store,
            &FixedEmbedder::failing(),
            vec![candidate("https://borsen.dk/new", "Ny historie om familie der sælger")],
            FreshnessMode::Standard,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(result.articles.len(), 1);
        assert!(result.articles[0].embedding.is_none());
    }

    #[tokio::test]
    async fn unreachable_store_is_an_error() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let result = filter_fresh(
            &store,
            &FixedEmbedder::new(),
            vec![candidate("https://borsen.dk/new", "Ny historie om familie der sælger")],
            FreshnessMode::Standard,
            Utc::now(),
        )
        .await;
        assert!(result.is_err());
    }
}
