use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use crate::traits::{SearchError, SearchHit, WebSearcher};

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
            endpoint: "https://google.serper.dev/search".to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(SearchError::Unavailable);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("Serper returned {status}").into());
        }

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let hits: Vec<SearchHit> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect();

        info!(query, count = hits.len(), "Serper search complete");
        Ok(hits)
    }
}

/// Stand-in when no search key is configured. Verification treats this as
/// an unavailable service and skips to salvage.
pub struct NoSearch;

#[async_trait]
impl WebSearcher for NoSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::Unavailable)
    }
}
