//! Pipeline scenarios against the in-memory store and scripted collaborators.
//!
//! Each test builds a small news world, runs the pipeline once or twice and
//! checks the stored documents. No network, no API keys.

use std::sync::Arc;

use serde_json::{json, Value};
use wealthsignal_common::{EnrichmentMethod, Environment, SourceConfig};
use wealthsignal_pipeline::notify::NotificationChannel;
use wealthsignal_pipeline::testing::*;
use wealthsignal_pipeline::traits::{IntelligenceRequest, IntelligenceTask, SearchHit, WebSearcher};
use wealthsignal_pipeline::{CommitStatus, Pipeline, PipelineDeps, RunOptions};
use wealthsignal_store::{MemoryStore, RetryPolicy};

fn source(key: &str, name: &str, host: &str) -> SourceConfig {
    let mut s = source_config(key, name, &format!("https://{host}"), "Denmark");
    s.start_url = format!("https://{host}/erhverv");
    s.article_selectors = vec!["div.body p".to_string()];
    s
}

/// Headline of an intelligence request's article, from the
/// "Headline: ..." first line used by per-article calls.
fn headline_of(request: &IntelligenceRequest) -> String {
    request
        .user
        .lines()
        .next()
        .and_then(|l| l.strip_prefix("Headline: "))
        .unwrap_or_default()
        .to_string()
}

fn score_all(score: i64) -> impl Fn(&IntelligenceRequest) -> anyhow::Result<Value> + Send + Sync {
    move |request| {
        let items: Vec<Value> = serde_json::from_str(&request.user)?;
        Ok(Value::Array(
            items
                .iter()
                .map(|_| json!({"relevance_headline": score, "assessment_headline": "scored"}))
                .collect(),
        ))
    }
}

fn base_intelligence() -> MockIntelligence {
    MockIntelligence::new()
        .on(IntelligenceTask::Preflight, |_| Ok(json!({"ok": true})))
        .on(IntelligenceTask::ArticleAssessment, |_| {
            Ok(json!({"relevance_article": 75, "assessment_article": "Relevant", "key_individuals": []}))
        })
        .on(IntelligenceTask::ContactExtraction, |_| Ok(json!([])))
        .on(IntelligenceTask::EntityExtraction, |_| Ok(json!([])))
        .on(IntelligenceTask::EventSynthesis, |_| {
            Ok(json!({
                "synthesized_headline": "Brief",
                "synthesized_summary": "Summary of the event.",
                "ai_assessment_reason": "Reason"
            }))
        })
}

struct Harness {
    store: Arc<MemoryStore>,
    fetcher: Arc<MockFetcher>,
    intelligence: Arc<MockIntelligence>,
    searcher: Arc<dyn WebSearcher>,
    email: Arc<RecordingChannel>,
}

impl Harness {
    fn new(store: MemoryStore, fetcher: MockFetcher, intelligence: MockIntelligence) -> Self {
        Self {
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            intelligence: Arc::new(intelligence),
            searcher: Arc::new(MockSearcher::unavailable()),
            email: Arc::new(RecordingChannel::email()),
        }
    }

    fn with_searcher(mut self, searcher: MockSearcher) -> Self {
        self.searcher = Arc::new(searcher);
        self
    }

    fn pipeline(&self, refresh: bool) -> Pipeline {
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![self.email.clone()];
        let deps = PipelineDeps::builder()
            .store(self.store.clone())
            .vectors(self.store.clone())
            .fetcher(self.fetcher.clone())
            .searcher(self.searcher.clone())
            .intelligence(self.intelligence.clone())
            .embedder(Arc::new(FixedEmbedder::new()))
            .encyclopedia(Arc::new(MockEncyclopedia::new()))
            .channels(channels)
            .environment(Environment::Production)
            .retry(RetryPolicy::immediate(2))
            .build();
        Pipeline::new(
            deps,
            RunOptions {
                refresh,
                ..RunOptions::default()
            },
        )
    }
}

#[tokio::test]
async fn enrichment_paths_follow_headline_signal() {
    // a/1 fetches directly, a/2 (high signal, no page) verifies at another
    // outlet, a/3 (mid signal, no page) is dropped without searching.
    let listing = listing_html(&[
        ("https://testavisen.dk/a/1", "Direkte: stifter sælger softwarehus"),
        ("https://testavisen.dk/a/2", "Verificeret: rederi skifter ejer i dag"),
        ("https://testavisen.dk/a/3", "Droppet: mindre handel i provinsen"),
    ]);
    let fetcher = MockFetcher::new()
        .on_page("https://testavisen.dk/erhverv", &listing)
        .on_page("https://testavisen.dk/a/1", &article_html("div class=\"body\""))
        .on_page("https://finans.dk/rederi", &article_html("article"));
    let searcher = MockSearcher::new().on_any(vec![SearchHit {
        title: "Rederi skifter ejer".to_string(),
        link: "https://finans.dk/rederi".to_string(),
        snippet: "Rederiet er solgt".to_string(),
    }]);

    let intelligence = base_intelligence()
        .on(IntelligenceTask::HeadlineAssessment, |request| {
            let items: Vec<Value> = serde_json::from_str(&request.user)?;
            Ok(Value::Array(
                items
                    .iter()
                    .map(|item| {
                        let headline = item["headline"].as_str().unwrap_or_default();
                        let score = if headline.starts_with("Droppet") { 60 } else { 90 };
                        json!({"relevance_headline": score, "assessment_headline": "scored"})
                    })
                    .collect(),
            ))
        })
        .on(IntelligenceTask::EventClustering, |_| Ok(json!([])));

    let store = MemoryStore::new().with_sources(vec![source("testavisen", "Testavisen", "testavisen.dk")]);
    let harness = Harness::new(store, fetcher, intelligence).with_searcher(searcher);

    let outcome = harness.pipeline(false).run().await.unwrap();

    let stats = &outcome.stats;
    assert_eq!(stats.enriched_direct, 1);
    assert_eq!(stats.enriched_verified, 1);
    assert_eq!(stats.enrichment_dropped, 1);
    assert_eq!(harness.intelligence.calls(IntelligenceTask::Salvage), 0);

    let direct = harness.store.article("https://testavisen.dk/a/1").unwrap();
    assert_eq!(direct.enrichment_method, Some(EnrichmentMethod::Direct));

    let verified = harness.store.article("https://testavisen.dk/a/2").unwrap();
    assert_eq!(verified.enrichment_method, Some(EnrichmentMethod::Verified));
    assert_eq!(verified.enriched_from.as_deref(), Some("https://finans.dk/rederi"));

    let dropped = harness.store.article("https://testavisen.dk/a/3").unwrap();
    assert!(dropped.enrichment_method.is_none());
    assert!(dropped.article_content.is_none());
    assert_eq!(dropped.relevance_headline, 60);
}

#[tokio::test]
async fn salvage_runs_only_when_every_fetch_fails() {
    let listing = listing_html(&[
        ("https://testavisen.dk/a/1", "Arving sælger hele aktieposten i koncernen"),
        ("https://testavisen.dk/a/2", "Mindre handel i provinsen blev aflyst"),
    ]);
    let fetcher = MockFetcher::new().on_page("https://testavisen.dk/erhverv", &listing);
    let intelligence = base_intelligence()
        .on(IntelligenceTask::HeadlineAssessment, |request| {
            let items: Vec<Value> = serde_json::from_str(&request.user)?;
            Ok(Value::Array(
                items
                    .iter()
                    .map(|item| {
                        let headline = item["headline"].as_str().unwrap_or_default();
                        let score = if headline.starts_with("Arving") { 85 } else { 79 };
                        json!({"relevance_headline": score, "assessment_headline": "scored"})
                    })
                    .collect(),
            ))
        })
        .on(IntelligenceTask::Salvage, |_| {
            Ok(json!({
                "headline": "Heir sells entire stake",
                "summary": "An heir has sold the family's entire shareholding.",
                "key_individuals": []
            }))
        });
    let store = MemoryStore::new().with_sources(vec![source("testavisen", "Testavisen", "testavisen.dk")]);
    let harness = Harness::new(store, fetcher, intelligence);

    let outcome = harness.pipeline(false).run().await.unwrap();

    assert_eq!(outcome.stats.enriched_salvaged, 1);
    assert_eq!(outcome.stats.enrichment_dropped, 1);
    assert_eq!(harness.intelligence.calls(IntelligenceTask::Salvage), 1);
    let salvaged = harness.store.article("https://testavisen.dk/a/1").unwrap();
    assert_eq!(salvaged.enrichment_method, Some(EnrichmentMethod::Salvaged));
    let below = harness.store.article("https://testavisen.dk/a/2").unwrap();
    assert!(below.enrichment_method.is_none());
}

#[tokio::test]
async fn duplicate_links_across_sources_collapse_before_freshness() {
    let shared = "https://borsen.dk/a/faelles";
    let fetcher = MockFetcher::new()
        .on_page(
            "https://borsen.dk/erhverv",
            &listing_html(&[(shared, "Kapitalfond køber familieejet rederi")]),
        )
        .on_page(
            "https://finans.dk/erhverv",
            &listing_html(&[
                (shared, "Kapitalfond køber familieejet rederi i Esbjerg"),
                ("https://finans.dk/a/2", "Bankdirektør stopper efter tyve år"),
            ]),
        );
    let intelligence = base_intelligence().on(IntelligenceTask::HeadlineAssessment, score_all(10));
    let store = MemoryStore::new().with_sources(vec![
        source("borsen", "Børsen", "borsen.dk"),
        source("finans", "Finans", "finans.dk"),
    ]);
    let harness = Harness::new(store, fetcher, intelligence);

    let outcome = harness.pipeline(false).run().await.unwrap();

    assert_eq!(outcome.stats.headlines_scraped, 2);
    assert_eq!(outcome.stats.cross_source_duplicates, 1);
    assert_eq!(harness.store.article_count(), 2);
}

#[tokio::test]
async fn event_carries_the_highest_member_relevance() {
    let links = [
        ("https://testavisen.dk/a/1", "Axcel køber Danske Rør: første melding"),
        ("https://testavisen.dk/a/2", "Axcel køber Danske Rør: detaljerne"),
        ("https://testavisen.dk/a/3", "Axcel køber Danske Rør: reaktionerne"),
    ];
    let fetcher = links.iter().fold(
        MockFetcher::new().on_page("https://testavisen.dk/erhverv", &listing_html(&links)),
        |f, (link, _)| f.on_page(link, &article_html("div class=\"body\"")),
    );
    let intelligence = base_intelligence()
        .on(IntelligenceTask::HeadlineAssessment, score_all(90))
        .on(IntelligenceTask::ArticleAssessment, |request| {
            let headline = headline_of(request);
            let score = if headline.ends_with("første melding") {
                70
            } else if headline.ends_with("detaljerne") {
                92
            } else {
                64
            };
            Ok(json!({"relevance_article": score, "assessment_article": "Deal", "key_individuals": []}))
        })
        .on(IntelligenceTask::EventClustering, |request| {
            let (_, list) = request
                .user
                .split_once("Articles:\n")
                .ok_or_else(|| anyhow::anyhow!("no article list"))?;
            let items: Vec<Value> = serde_json::from_str(list)?;
            let ids: Vec<Value> = items.iter().map(|i| i["id"].clone()).collect();
            Ok(json!([{"event_key": "axcel-buys-danske-ror", "article_ids": ids}]))
        });
    let store = MemoryStore::new().with_sources(vec![source("testavisen", "Testavisen", "testavisen.dk")]);
    let harness = Harness::new(store, fetcher, intelligence);

    harness.pipeline(false).run().await.unwrap();

    let events = harness.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_articles.len(), 3);
    assert_eq!(events[0].highest_relevance_score, 92);
}

#[tokio::test]
async fn rediscovery_grows_reasons_and_never_lowers_wealth() {
    let link = "https://testavisen.dk/a/1";
    let fetcher = MockFetcher::new()
        .on_page(
            "https://testavisen.dk/erhverv",
            &listing_html(&[(link, "Familien Holm sælger Danske Rør til Axcel")]),
        )
        .on_page(link, &article_html("div class=\"body\""));

    let first = base_intelligence()
        .on(IntelligenceTask::HeadlineAssessment, score_all(90))
        .on(IntelligenceTask::ContactExtraction, |_| {
            Ok(json!([
                {"name": "Jens Holm", "why_contact": "Sold Danske Rør", "likely_mm_dollar_wealth": 130},
                {"name": "Peter Lille", "why_contact": "Minor holder", "likely_mm_dollar_wealth": 12}
            ]))
        });
    let store = MemoryStore::new().with_sources(vec![source("testavisen", "Testavisen", "testavisen.dk")]);
    let harness = Harness::new(store, fetcher, first);
    harness.pipeline(false).run().await.unwrap();

    let stored = harness.store.opportunity("Jens Holm").unwrap();
    assert_eq!(stored.why_contact, vec!["Sold Danske Rør".to_string()]);
    assert!(harness.store.opportunity("Peter Lille").is_none());

    // Second discovery: lower wealth estimate, new reason.
    let second = Harness {
        intelligence: Arc::new(
            base_intelligence()
                .on(IntelligenceTask::HeadlineAssessment, score_all(90))
                .on(IntelligenceTask::ContactExtraction, |_| {
                    Ok(json!([
                        {"name": "jens  holm", "why_contact": "Reinvesting proceeds", "likely_mm_dollar_wealth": 90}
                    ]))
                }),
        ),
        ..harness
    };
    second.pipeline(true).run().await.unwrap();

    let merged = second.store.opportunity("Jens Holm").unwrap();
    assert_eq!(second.store.opportunity_count(), 1);
    assert_eq!(merged.id, stored.id);
    assert_eq!(
        merged.why_contact,
        vec!["Reinvesting proceeds".to_string(), "Sold Danske Rør".to_string()]
    );
    assert_eq!(merged.likely_mm_dollar_wealth, 130.0);
}

#[tokio::test]
async fn norwegian_subscriber_gets_nothing_from_a_danish_run() {
    let link = "https://testavisen.dk/a/1";
    let fetcher = MockFetcher::new()
        .on_page(
            "https://testavisen.dk/erhverv",
            &listing_html(&[(link, "Familien Holm sælger Danske Rør til Axcel")]),
        )
        .on_page(link, &article_html("div class=\"body\""));
    let intelligence = base_intelligence().on(IntelligenceTask::HeadlineAssessment, score_all(90));
    let store = MemoryStore::new()
        .with_sources(vec![source("testavisen", "Testavisen", "testavisen.dk")])
        .with_subscribers(vec![subscriber("nora@bank.no", &["Norway"])]);
    let harness = Harness::new(store, fetcher, intelligence);

    let outcome = harness.pipeline(false).run().await.unwrap();

    assert_eq!(outcome.commit, CommitStatus::Committed);
    assert_eq!(outcome.stats.events_committed, 1);
    assert!(harness.email.deliveries().is_empty());
    assert!(!harness.store.events()[0].emailed);
}
