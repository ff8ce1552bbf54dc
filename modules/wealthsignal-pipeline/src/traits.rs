// Trait boundaries for everything the pipeline talks to over the network.
//
// Production implementations live in `infra/`; deterministic mocks live in
// `testing.rs`. Stages only ever see these traits.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// One page-fetch session shared by every task in a run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Rendered HTML for `url`, or `None` when the page could not be loaded.
    async fn fetch(&self, url: &str) -> Option<String>;

    /// Release the session. Fetches after this return `None`.
    async fn close(&self);
}

// ---------------------------------------------------------------------------
// WebSearcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search service unavailable")]
    Unavailable,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

// ---------------------------------------------------------------------------
// IntelligenceService
// ---------------------------------------------------------------------------

/// Which call is being made. Lets mocks script responses per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntelligenceTask {
    Preflight,
    HeadlineAssessment,
    ArticleAssessment,
    Salvage,
    ContactExtraction,
    ContactDisambiguation,
    EventClustering,
    EntityExtraction,
    EventSynthesis,
}

#[derive(Debug, Clone)]
pub struct IntelligenceRequest {
    pub task: IntelligenceTask,
    pub system: String,
    /// Worked examples as (user, assistant) pairs.
    pub examples: Vec<(String, String)>,
    pub user: String,
}

impl IntelligenceRequest {
    pub fn new(task: IntelligenceTask, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            task,
            system: system.into(),
            examples: Vec::new(),
            user: user.into(),
        }
    }

    pub fn with_examples(mut self, examples: &[(&str, &str)]) -> Self {
        self.examples = examples
            .iter()
            .map(|(u, a)| (u.to_string(), a.to_string()))
            .collect();
        self
    }
}

/// Text-generation service that answers in JSON. Callers validate the
/// shape of every response themselves.
#[async_trait]
pub trait IntelligenceService: Send + Sync {
    async fn complete_json(&self, request: &IntelligenceRequest) -> Result<serde_json::Value>;
}

// ---------------------------------------------------------------------------
// TextEmbedder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// Encyclopedia
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EncyclopediaPage {
    pub title: String,
    /// Short description line ("Danish shipping company").
    pub description: Option<String>,
    pub extract: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait Encyclopedia: Send + Sync {
    /// Candidate page titles for a free-text query, best first.
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    async fn page_summary(&self, title: &str) -> Result<Option<EncyclopediaPage>>;
}
