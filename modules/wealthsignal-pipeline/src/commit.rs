//! Idempotent commit of one run's results.
//!
//! Articles upsert by `link`, events by `event_key`, opportunities by
//! `reach_out_to`. Vector writes are separate and best-effort. Nothing is
//! rolled back: a failure is reported after every write has been attempted.

use std::collections::HashMap;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use wealthsignal_common::{Article, Opportunity, SynthesizedEvent, Thresholds, WealthSignalError};
use wealthsignal_store::{DocumentStore, RetryPolicy, VectorIndex};

#[derive(Debug, Default, Clone)]
pub struct CommitReport {
    pub articles_written: usize,
    pub vectors_written: usize,
    /// Every committed event with its stored id.
    pub events: Vec<SynthesizedEvent>,
    /// Stored (merged) opportunities.
    pub opportunities: Vec<Opportunity>,
    /// Country each opportunity is reported under.
    pub opportunity_countries: HashMap<Uuid, String>,
    pub failures: Vec<String>,
}

impl CommitReport {
    pub fn unemailed_events(&self) -> impl Iterator<Item = &SynthesizedEvent> {
        self.events.iter().filter(|e| !e.emailed)
    }

    pub fn unemailed_opportunities(&self) -> impl Iterator<Item = &Opportunity> {
        self.opportunities.iter().filter(|o| !o.emailed)
    }
}

/// Drop `article_content` from articles that did not clear the retention bar.
pub fn strip_low_relevance_content(articles: &mut [Article], thresholds: &Thresholds) {
    for article in articles {
        if article.best_relevance() < thresholds.content_retention_relevance {
            article.article_content = None;
        }
    }
}

pub async fn commit(
    store: &dyn DocumentStore,
    vectors: &dyn VectorIndex,
    retry: &RetryPolicy,
    mut articles: Vec<Article>,
    events: Vec<SynthesizedEvent>,
    opportunities: Vec<Opportunity>,
    thresholds: &Thresholds,
) -> Result<CommitReport, WealthSignalError> {
    let mut report = CommitReport::default();
    strip_low_relevance_content(&mut articles, thresholds);

    // --- Articles ---

    let bulk = store.bulk_upsert_articles(&articles).await;
    report.articles_written = bulk.written;
    if !bulk.is_complete() {
        let by_link: HashMap<&str, &Article> = articles.iter().map(|a| (a.link.as_str(), a)).collect();
        for (link, first_error) in &bulk.failed {
            let Some(article) = by_link.get(link.as_str()) else {
                continue;
            };
            match retry.run("upsert_article", || store.upsert_article(article)).await {
                Ok(()) => report.articles_written += 1,
                Err(e) => {
                    warn!(link = link.as_str(), first_error = first_error.as_str(), error = %e, "Article write failed");
                    report.failures.push(format!("article {link}: {e}"));
                }
            }
        }
    }

    // --- Vectors ---

    for article in &articles {
        let Some(embedding) = article.embedding.as_deref() else {
            continue;
        };
        let metadata = json!({
            "link": article.link,
            "headline": article.headline,
            "newspaper": article.newspaper,
            "country": article.country,
        });
        match vectors.upsert_vector(article.id, embedding, metadata).await {
            Ok(()) => report.vectors_written += 1,
            Err(e) => warn!(link = article.link.as_str(), error = %e, "Vector write failed"),
        }
    }

    // --- Events ---

    let article_ids: HashMap<&str, Uuid> = articles.iter().map(|a| (a.link.as_str(), a.id)).collect();
    let mut event_for_article: HashMap<Uuid, Uuid> = HashMap::new();
    for mut event in events {
        match retry.run("upsert_event", || store.upsert_event(&event)).await {
            Ok(outcome) => {
                event.id = outcome.id;
                event.emailed = outcome.emailed;
                for source in &event.source_articles {
                    if let Some(article_id) = article_ids.get(source.link.as_str()) {
                        event_for_article.insert(*article_id, event.id);
                    }
                }
                info!(
                    event_key = event.event_key.as_str(),
                    inserted = outcome.inserted,
                    sources = event.source_articles.len(),
                    "Event committed"
                );
                report.events.push(event);
            }
            Err(e) => {
                warn!(event_key = event.event_key.as_str(), error = %e, "Event write failed");
                report.failures.push(format!("event {}: {e}", event.event_key));
            }
        }
    }

    // --- Opportunities ---

    let article_countries: HashMap<Uuid, &str> = articles.iter().map(|a| (a.id, a.country.as_str())).collect();
    for mut opportunity in opportunities {
        let event_id = opportunity
            .source_article_id
            .and_then(|id| event_for_article.get(&id).copied());
        if event_id.is_some() {
            opportunity.source_event_id = event_id;
        }
        match retry
            .run("upsert_opportunity", || store.upsert_opportunity(&opportunity))
            .await
        {
            Ok(stored) => {
                if let Some(event_id) = event_id {
                    if let Err(e) = retry
                        .run("link_opportunity", || {
                            store.link_opportunity_to_event(&stored.reach_out_to, event_id)
                        })
                        .await
                    {
                        warn!(name = stored.reach_out_to.as_str(), error = %e, "Opportunity link failed");
                    }
                }
                let country = opportunity
                    .source_article_id
                    .and_then(|id| article_countries.get(&id).map(|c| c.to_string()))
                    .unwrap_or_else(|| stored.based_in.clone());
                report.opportunity_countries.insert(stored.id, country);
                report.opportunities.push(stored);
            }
            Err(e) => {
                warn!(name = opportunity.reach_out_to.as_str(), error = %e, "Opportunity write failed");
                report.failures.push(format!("opportunity {}: {e}", opportunity.reach_out_to));
            }
        }
    }

    info!(
        articles = report.articles_written,
        vectors = report.vectors_written,
        events = report.events.len(),
        opportunities = report.opportunities.len(),
        failures = report.failures.len(),
        "Commit complete"
    );

    if report.failures.is_empty() {
        Ok(report)
    } else {
        Err(WealthSignalError::CommitFailed(format!(
            "{} write(s) failed: {}",
            report.failures.len(),
            report.failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::Utc;
    use wealthsignal_common::{ContactDetails, EnrichmentMethod};
    use wealthsignal_store::MemoryStore;

    fn event(key: &str, links: &[&Article]) -> SynthesizedEvent {
        let now = Utc::now();
        SynthesizedEvent {
            id: Uuid::new_v4(),
            event_key: key.to_string(),
            synthesized_headline: "Holm family sells".to_string(),
            synthesized_summary: "Summary".to_string(),
            ai_assessment_reason: "Exit".to_string(),
            country: "Denmark".to_string(),
            source_articles: links.iter().map(|a| a.source_ref()).collect(),
            highest_relevance_score: 90,
            key_individuals: Vec::new(),
            emailed: false,
            email_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn opportunity(name: &str, wealth: f64, reason: &str, article: &Article) -> Opportunity {
        let now = Utc::now();
        Opportunity {
            id: Uuid::new_v4(),
            reach_out_to: name.to_string(),
            contact_details: ContactDetails::default(),
            based_in: String::new(),
            why_contact: vec![reason.to_string()],
            likely_mm_dollar_wealth: wealth,
            source_article_id: Some(article.id),
            source_event_id: None,
            emailed: false,
            email_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn enriched(link: &str, score: i32) -> Article {
        let mut a = stored_article(link, "Familien Holm sælger Danske Rør til Axcel", 85);
        a.relevance_article = Some(score);
        a.article_content = Some("Full text".to_string());
        a.enrichment_method = Some(EnrichmentMethod::Direct);
        a.embedding = Some(vec![0.1, 0.2, 0.3]);
        a
    }

    #[tokio::test]
    async fn repeated_commits_do_not_duplicate() {
        let store = MemoryStore::new();
        let article = enriched("https://borsen.dk/1", 90);
        let retry = RetryPolicy::immediate(3);
        let t = Thresholds::default();

        for _ in 0..2 {
            commit(
                &store,
                &store,
                &retry,
                vec![article.clone()],
                vec![event("holm-sells-2025-03-14", &[&article])],
                vec![opportunity("Jens Holm", 100.0, "Sold Danske Rør", &article)],
                &t,
            )
            .await
            .unwrap();
        }

        assert_eq!(store.article_count(), 1);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.opportunity_count(), 1);
        let stored = store.opportunity("Jens Holm").unwrap();
        assert_eq!(stored.source_event_id, Some(store.events()[0].id));
    }

    #[tokio::test]
    async fn low_relevance_content_is_stripped() {
        let store = MemoryStore::new();
        let keep = enriched("https://borsen.dk/keep", 60);
        let strip = enriched("https://borsen.dk/strip", 20);
        commit(
            &store,
            &store,
            &RetryPolicy::immediate(1),
            vec![keep, strip],
            Vec::new(),
            Vec::new(),
            &Thresholds::default(),
        )
        .await
        .unwrap();

        assert!(store.article("https://borsen.dk/keep").unwrap().article_content.is_some());
        assert!(store.article("https://borsen.dk/strip").unwrap().article_content.is_none());
        assert_eq!(store.vector_count(), 2);
    }

    #[tokio::test]
    async fn failed_event_write_is_reported_after_other_writes() {
        let store = MemoryStore::new();
        store.break_event_writes(true);
        let article = enriched("https://borsen.dk/1", 90);

        let err = commit(
            &store,
            &store,
            &RetryPolicy::immediate(3),
            vec![article.clone()],
            vec![event("holm-sells-2025-03-14", &[&article])],
            vec![opportunity("Jens Holm", 100.0, "Sold", &article)],
            &Thresholds::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WealthSignalError::CommitFailed(_)));
        assert_eq!(store.article_count(), 1);
        assert_eq!(store.opportunity_count(), 1);
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn rediscovery_grows_history_and_keeps_max_wealth() {
        let store = MemoryStore::new();
        let article = enriched("https://borsen.dk/1", 90);
        let retry = RetryPolicy::immediate(1);
        let t = Thresholds::default();

        commit(&store, &store, &retry, vec![], vec![], vec![opportunity("Jens Holm", 200.0, "Sold", &article)], &t)
            .await
            .unwrap();
        commit(&store, &store, &retry, vec![], vec![], vec![opportunity("jens holm", 80.0, "Joined board", &article)], &t)
            .await
            .unwrap();

        let stored = store.opportunity("Jens Holm").unwrap();
        assert_eq!(stored.likely_mm_dollar_wealth, 200.0);
        assert_eq!(stored.why_contact, vec!["Joined board", "Sold"]);
    }
}
