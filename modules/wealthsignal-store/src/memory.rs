// In-memory document store and vector index.
//
// Backs dry runs and every test. Same keyed-upsert semantics as the
// Postgres store, plus a few switches for simulating outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wealthsignal_common::{
    normalize_name, Article, Opportunity, SourceConfig, Subscriber, SynthesizedEvent,
};

use crate::error::{Result, StoreError};
use crate::traits::{DocumentStore, RunRecord, UpsertOutcome, VectorIndex, VectorRecord};

#[derive(Default)]
pub struct MemoryStore {
    sources: Mutex<HashMap<String, SourceConfig>>,
    articles: Mutex<HashMap<String, Article>>,
    events: Mutex<HashMap<String, SynthesizedEvent>>,
    opportunities: Mutex<HashMap<String, Opportunity>>,
    subscribers: Mutex<Vec<Subscriber>>,
    vectors: Mutex<HashMap<Uuid, VectorRecord>>,
    runs: Mutex<Vec<RunRecord>>,
    offline: AtomicBool,
    event_writes_broken: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(self, sources: Vec<SourceConfig>) -> Self {
        {
            let mut map = self.sources.lock().unwrap_or_else(|e| e.into_inner());
            for source in sources {
                map.insert(source.key.clone(), source);
            }
        }
        self
    }

    pub fn with_subscribers(self, subscribers: Vec<Subscriber>) -> Self {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(subscribers);
        self
    }

    pub fn with_articles(self, articles: Vec<Article>) -> Self {
        {
            let mut map = self.articles.lock().unwrap_or_else(|e| e.into_inner());
            for article in articles {
                map.insert(article.link.clone(), article);
            }
        }
        self
    }

    pub fn with_vector(self, id: Uuid, vector: Vec<f32>, metadata: serde_json::Value) -> Self {
        self.vectors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id,
                VectorRecord {
                    id,
                    vector,
                    metadata,
                },
            );
        self
    }

    /// Every call fails with a transient error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Event upserts fail while set; everything else keeps working.
    pub fn break_event_writes(&self, broken: bool) {
        self.event_writes_broken.store(broken, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    // --- Inspection helpers ---

    pub fn source(&self, key: &str) -> Option<SourceConfig> {
        self.sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn article(&self, link: &str) -> Option<Article> {
        self.articles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(link)
            .cloned()
    }

    pub fn article_count(&self) -> usize {
        self.articles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn events(&self) -> Vec<SynthesizedEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn opportunity(&self, reach_out_to: &str) -> Option<Opportunity> {
        self.opportunities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&normalize_name(reach_out_to))
            .cloned()
    }

    pub fn opportunity_count(&self) -> usize {
        self.opportunities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn active_sources(&self) -> Result<Vec<SourceConfig>> {
        self.check_online()?;
        let mut sources: Vec<SourceConfig> = self
            .sources
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(sources)
    }

    async fn record_source_scrape(&self, key: &str, success: bool, at: DateTime<Utc>) -> Result<()> {
        self.check_online()?;
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        let source = sources
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("source {key}")))?;
        source.last_scraped_at = Some(at);
        if success {
            source.last_success_at = Some(at);
            source.consecutive_failures = 0;
        } else {
            source.consecutive_failures += 1;
        }
        Ok(())
    }

    async fn find_articles_by_links(&self, links: &[String]) -> Result<Vec<Article>> {
        self.check_online()?;
        let articles = self.articles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(links.iter().filter_map(|l| articles.get(l).cloned()).collect())
    }

    async fn find_articles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Article>> {
        self.check_online()?;
        let articles = self.articles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(articles
            .values()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn upsert_article(&self, article: &Article) -> Result<()> {
        self.check_online()?;
        let mut articles = self.articles.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = article.clone();
        if let Some(existing) = articles.get(&article.link) {
            doc.id = existing.id;
            doc.created_at = existing.created_at;
        }
        articles.insert(doc.link.clone(), doc);
        Ok(())
    }

    async fn upsert_event(&self, event: &SynthesizedEvent) -> Result<UpsertOutcome> {
        self.check_online()?;
        if self.event_writes_broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "event write rejected for {}",
                event.event_key
            )));
        }
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let mut doc = event.clone();
        let inserted = match events.get(&event.event_key) {
            Some(existing) => {
                doc.id = existing.id;
                doc.created_at = existing.created_at;
                doc.emailed = existing.emailed;
                doc.email_sent_at = existing.email_sent_at;
                false
            }
            None => true,
        };
        let outcome = UpsertOutcome {
            id: doc.id,
            inserted,
            emailed: doc.emailed,
        };
        events.insert(doc.event_key.clone(), doc);
        Ok(outcome)
    }

    async fn upsert_opportunity(&self, opportunity: &Opportunity) -> Result<Opportunity> {
        self.check_online()?;
        let mut opportunities = self.opportunities.lock().unwrap_or_else(|e| e.into_inner());
        let key = normalize_name(&opportunity.reach_out_to);
        let stored = match opportunities.get(&key) {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.merge_discovery(opportunity);
                merged
            }
            None => opportunity.clone(),
        };
        opportunities.insert(key, stored.clone());
        Ok(stored)
    }

    async fn link_opportunity_to_event(&self, reach_out_to: &str, event_id: Uuid) -> Result<()> {
        self.check_online()?;
        let mut opportunities = self.opportunities.lock().unwrap_or_else(|e| e.into_inner());
        let opportunity = opportunities
            .get_mut(&normalize_name(reach_out_to))
            .ok_or_else(|| StoreError::NotFound(format!("opportunity {reach_out_to}")))?;
        opportunity.source_event_id = Some(event_id);
        Ok(())
    }

    async fn mark_events_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        self.check_online()?;
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        for event in events.values_mut().filter(|e| ids.contains(&e.id)) {
            event.emailed = true;
            event.email_sent_at = Some(at);
        }
        Ok(())
    }

    async fn mark_opportunities_emailed(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        self.check_online()?;
        let mut opportunities = self.opportunities.lock().unwrap_or_else(|e| e.into_inner());
        for opportunity in opportunities.values_mut().filter(|o| ids.contains(&o.id)) {
            opportunity.emailed = true;
            opportunity.email_sent_at = Some(at);
        }
        Ok(())
    }

    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.check_online()?;
        Ok(self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        self.check_online()?;
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(run.clone());
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryStore {
    async fn upsert_vector(
        &self,
        id: Uuid,
        vector: &[f32],
        metadata: serde_json::Value,
    ) -> Result<()> {
        self.check_online()?;
        self.vectors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id,
                VectorRecord {
                    id,
                    vector: vector.to_vec(),
                    metadata,
                },
            );
        Ok(())
    }

    async fn vectors(&self) -> Result<Vec<VectorRecord>> {
        self.check_online()?;
        Ok(self
            .vectors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }
}
