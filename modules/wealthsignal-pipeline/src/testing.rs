// Test mocks for the wealthsignal pipeline.
//
// One mock per trait boundary:
// - MockFetcher (PageFetcher): HashMap-based URL→HTML
// - MockSearcher (WebSearcher): canned hits or an unavailable service
// - MockIntelligence (IntelligenceService): per-task response closures
// - FixedEmbedder (TextEmbedder): deterministic hash-based vectors
// - MockEncyclopedia (Encyclopedia): canned titles and pages
// - RecordingChannel (NotificationChannel): records every delivery
// - RecordingSupervisor (SupervisorBackend): records alerts and digests
//
// Plus builders for articles, candidates, sources and subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use wealthsignal_common::{Article, CandidateHeadline, SourceConfig, SourceStatus, Subscriber};

use crate::notify::{ChannelKind, Digest, NotificationChannel, SupervisorAlert, SupervisorBackend};
use crate::pipeline::stats::RunStats;
use crate::traits::{
    Encyclopedia, EncyclopediaPage, IntelligenceRequest, IntelligenceService, IntelligenceTask,
    PageFetcher, SearchError, SearchHit, TextEmbedder, WebSearcher,
};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Standard embedding dimension for test vectors.
pub const TEST_EMBEDDING_DIM: usize = 64;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Unregistered URLs return `None`.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Every URL requested, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.is_closed() {
            return None;
        }
        self.pages.get(url).cloned()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A page whose body sits inside `<{open_tag}>`, long enough to pass the
/// minimum-content check. `open_tag` may carry attributes: `div class="body"`.
pub fn article_html(open_tag: &str) -> String {
    let tag = open_tag.split_whitespace().next().unwrap_or("div");
    let paragraphs: String = (0..8)
        .map(|i| {
            format!(
                "<p>Afsnit {i}: Stifteren har solgt sin aktiepost i virksomheden til en international kapitalfond for et trecifret millionbeløb.</p>"
            )
        })
        .collect();
    format!(
        "<html><head><title>Artikel</title></head><body><nav>Forside</nav><{open_tag}>{paragraphs}</{tag}></body></html>"
    )
}

/// A listing page with one anchor per (href, text) pair.
pub fn listing_html(links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{href}\">{text}</a></li>"))
        .collect();
    format!("<html><body><ul>{anchors}</ul></body></html>")
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Returns the same hits for every query, or `Unavailable` when built with
/// [`MockSearcher::unavailable`].
pub struct MockSearcher {
    hits: Option<Vec<SearchHit>>,
    calls: AtomicUsize,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            hits: Some(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            hits: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_any(mut self, hits: Vec<SearchHit>) -> Self {
        self.hits = Some(hits);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.hits {
            Some(hits) => Ok(hits.iter().take(max_results).cloned().collect()),
            None => Err(SearchError::Unavailable),
        }
    }
}

// ---------------------------------------------------------------------------
// MockIntelligence
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&IntelligenceRequest) -> Result<Value> + Send + Sync>;

/// Per-task scripted responses. Tasks without a handler fail, which the
/// pipeline treats like a malformed model reply.
pub struct MockIntelligence {
    handlers: HashMap<IntelligenceTask, Handler>,
    requests: Mutex<Vec<IntelligenceRequest>>,
}

impl MockIntelligence {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(mut self, task: IntelligenceTask, handler: F) -> Self
    where
        F: Fn(&IntelligenceRequest) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(task, Box::new(handler));
        self
    }

    pub fn calls(&self, task: IntelligenceTask) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .count()
    }

    pub fn requests(&self, task: IntelligenceTask) -> Vec<IntelligenceRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.task == task)
            .cloned()
            .collect()
    }
}

impl Default for MockIntelligence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntelligenceService for MockIntelligence {
    async fn complete_json(&self, request: &IntelligenceRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        match self.handlers.get(&request.task) {
            Some(handler) => handler(request),
            None => bail!("no mock response for {:?}", request.task),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder. Registered texts get their exact vector; all
/// other text gets a hash-seeded unit vector.
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    constant: Option<Vec<f32>>,
    failing: bool,
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            constant: None,
            failing: false,
            dimension: TEST_EMBEDDING_DIM,
        }
    }

    /// Every call errors.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Every text maps to `vector`.
    pub fn constant(vector: Vec<f32>) -> Self {
        Self {
            dimension: vector.len(),
            constant: Some(vector),
            ..Self::new()
        }
    }

    /// Register a text→vector mapping for controlled similarity.
    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.vectors.get(text) {
            return v.clone();
        }
        if let Some(v) = &self.constant {
            return v.clone();
        }
        self.hash_vector(text)
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        for v in vec.iter_mut() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing {
            bail!("embedding service down");
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if self.failing {
            bail!("embedding service down");
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// MockEncyclopedia
// ---------------------------------------------------------------------------

pub struct MockEncyclopedia {
    titles: HashMap<String, Vec<String>>,
    pages: HashMap<String, EncyclopediaPage>,
}

impl MockEncyclopedia {
    pub fn new() -> Self {
        Self {
            titles: HashMap::new(),
            pages: HashMap::new(),
        }
    }

    pub fn with_titles(mut self, query: &str, titles: &[&str]) -> Self {
        self.titles
            .insert(query.to_string(), titles.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_page(mut self, title: &str, description: Option<&str>, extract: &str) -> Self {
        self.pages.insert(
            title.to_string(),
            EncyclopediaPage {
                title: title.to_string(),
                description: description.map(str::to_string),
                extract: extract.to_string(),
                url: Some(format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))),
            },
        );
        self
    }
}

impl Default for MockEncyclopedia {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Encyclopedia for MockEncyclopedia {
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .titles
            .get(query)
            .map(|t| t.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn page_summary(&self, title: &str) -> Result<Option<EncyclopediaPage>> {
        Ok(self.pages.get(title).cloned())
    }
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

/// Notification channel that records deliveries instead of sending them.
pub struct RecordingChannel {
    kind: ChannelKind,
    failing_for: HashSet<String>,
    deliveries: Mutex<Vec<(String, Digest)>>,
}

impl RecordingChannel {
    pub fn email() -> Self {
        Self::of(ChannelKind::Email)
    }

    pub fn push() -> Self {
        Self::of(ChannelKind::Push)
    }

    fn of(kind: ChannelKind) -> Self {
        Self {
            kind,
            failing_for: HashSet::new(),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    /// Sends to this address fail.
    pub fn failing_for(mut self, email: &str) -> Self {
        self.failing_for.insert(email.to_string());
        self
    }

    /// (subscriber email, digest) for every successful send.
    pub fn deliveries(&self) -> Vec<(String, Digest)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, subscriber: &Subscriber, digest: &Digest) -> Result<()> {
        if self.failing_for.contains(&subscriber.email) {
            bail!("mailbox unavailable for {}", subscriber.email);
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((subscriber.email.clone(), digest.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSupervisor
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSupervisor {
    alerts: Mutex<Vec<SupervisorAlert>>,
    digests: Mutex<Vec<RunStats>>,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_titles(&self) -> Vec<String> {
        self.alerts.lock().unwrap().iter().map(|a| a.title.clone()).collect()
    }

    pub fn digests(&self) -> usize {
        self.digests.lock().unwrap().len()
    }
}

#[async_trait]
impl SupervisorBackend for RecordingSupervisor {
    async fn alert(&self, alert: &SupervisorAlert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn send_digest(&self, stats: &RunStats) -> Result<()> {
        self.digests.lock().unwrap().push(stats.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// An article as it would sit in the store after headline assessment.
pub fn stored_article(link: &str, headline: &str, relevance_headline: i32) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        link: link.to_string(),
        headline: headline.to_string(),
        newspaper: "Børsen".to_string(),
        country: "Denmark".to_string(),
        relevance_headline,
        assessment_headline: format!("Scored {relevance_headline}"),
        article_content: None,
        relevance_article: None,
        assessment_article: None,
        topic: None,
        key_individuals: Vec::new(),
        embedding: None,
        enrichment_method: None,
        enriched_from: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn candidate(link: &str, headline: &str) -> CandidateHeadline {
    CandidateHeadline {
        headline: headline.to_string(),
        link: link.to_string(),
        newspaper: "Børsen".to_string(),
        country: "Denmark".to_string(),
    }
}

pub fn source_config(key: &str, name: &str, base_url: &str, country: &str) -> SourceConfig {
    SourceConfig {
        id: Uuid::new_v4(),
        key: key.to_string(),
        name: name.to_string(),
        base_url: base_url.to_string(),
        start_url: base_url.to_string(),
        country: country.to_string(),
        status: SourceStatus::Active,
        strategy: None,
        headline_selector: None,
        link_selector: None,
        article_selectors: Vec::new(),
        last_scraped_at: None,
        last_success_at: None,
        consecutive_failures: 0,
    }
}

pub fn subscriber(email: &str, countries: &[&str]) -> Subscriber {
    Subscriber {
        id: Uuid::new_v4(),
        email: email.to_string(),
        countries: countries.iter().map(|c| c.to_string()).collect(),
        email_notifications_enabled: true,
        push_notifications_enabled: false,
        is_active: true,
    }
}
