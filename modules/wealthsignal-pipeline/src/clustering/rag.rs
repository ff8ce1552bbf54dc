use std::collections::HashMap;

use anyhow::{Context, Result};
use wealthsignal_common::Article;
use wealthsignal_store::{nearest, DocumentStore, VectorRecord};

use super::grouping::Cluster;
use crate::traits::TextEmbedder;

/// A stored article similar to a cluster, with its similarity score.
#[derive(Debug, Clone)]
pub struct HistoricalArticle {
    pub article: Article,
    pub similarity: f64,
}

/// Text the cluster is embedded from: every member's headline and assessment.
pub fn combined_text(cluster: &Cluster) -> String {
    cluster
        .members
        .iter()
        .map(|a| match a.assessment_article.as_deref() {
            Some(assessment) if !assessment.is_empty() => format!("{}. {}", a.headline, assessment),
            _ => a.headline.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stored articles whose vectors sit strictly above `threshold` similarity to
/// the cluster, most similar first, at most `k`. Members are excluded.
/// `records` is the vector snapshot fetched once for the run.
pub async fn historical_context(
    embedder: &dyn TextEmbedder,
    store: &dyn DocumentStore,
    records: &[VectorRecord],
    cluster: &Cluster,
    threshold: f64,
    k: usize,
) -> Result<Vec<HistoricalArticle>> {
    if records.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let query = embedder
        .embed(&combined_text(cluster))
        .await
        .context("embedding cluster text")?;

    let hits = nearest(records, &query, threshold, k, &cluster.member_ids());
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
    let mut by_id: HashMap<_, Article> = store
        .find_articles_by_ids(&ids)
        .await
        .context("loading historical articles")?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            by_id.remove(&hit.id).map(|article| HistoricalArticle {
                article,
                similarity: hit.similarity,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stored_article, FixedEmbedder};
    use serde_json::json;
    use wealthsignal_store::MemoryStore;

    #[tokio::test]
    async fn ranks_by_similarity_and_skips_members() {
        let member = stored_article("https://borsen.dk/new", "Familien Holm sælger Danske Rør", 80);
        let close = stored_article("https://borsen.dk/old1", "Danske Rør til salg", 70);
        let closer = stored_article("https://borsen.dk/old2", "Holm-familien overvejer salg", 70);
        let far = stored_article("https://borsen.dk/old3", "Rentemøde i Nationalbanken", 10);

        let embedder = FixedEmbedder::constant(vec![1.0, 0.0, 0.0]);
        let records = vec![
            VectorRecord { id: member.id, vector: vec![1.0, 0.0, 0.0], metadata: json!({}) },
            VectorRecord { id: close.id, vector: vec![0.85, 0.5, 0.0], metadata: json!({}) },
            VectorRecord { id: closer.id, vector: vec![0.95, 0.1, 0.0], metadata: json!({}) },
            VectorRecord { id: far.id, vector: vec![0.0, 1.0, 0.0], metadata: json!({}) },
        ];
        let store = MemoryStore::new().with_articles(vec![member.clone(), close.clone(), closer.clone(), far]);
        let cluster = Cluster {
            event_key: "holm-2025-03-14".to_string(),
            members: vec![member],
        };

        let history = historical_context(&embedder, &store, &records, &cluster, 0.80, 3)
            .await
            .unwrap();

        let links: Vec<&str> = history.iter().map(|h| h.article.link.as_str()).collect();
        assert_eq!(links, vec!["https://borsen.dk/old2", "https://borsen.dk/old1"]);
        assert!(history[0].similarity >= history[1].similarity);
    }
}
