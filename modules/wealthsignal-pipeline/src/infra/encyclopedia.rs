use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::traits::{Encyclopedia, EncyclopediaPage};

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

/// Wikipedia lookups: opensearch for titles, the REST summary for pages.
pub struct WikipediaEncyclopedia {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    kind: String,
    description: Option<String>,
    #[serde(default)]
    extract: String,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

impl WikipediaEncyclopedia {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("WealthSignal/0.1 (news intelligence)")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

/// Opensearch replies with `[query, [titles], [descriptions], [urls]]`.
fn parse_opensearch(value: &serde_json::Value) -> Vec<String> {
    value
        .get(1)
        .and_then(|v| v.as_array())
        .map(|titles| {
            titles
                .iter()
                .filter_map(|t| t.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn into_page(summary: Summary) -> Option<EncyclopediaPage> {
    if summary.kind == "disambiguation" || summary.extract.trim().is_empty() {
        return None;
    }
    Some(EncyclopediaPage {
        title: summary.title,
        description: summary.description.filter(|d| !d.trim().is_empty()),
        extract: summary.extract,
        url: summary.content_urls.and_then(|c| c.desktop).and_then(|d| d.page),
    })
}

#[async_trait]
impl Encyclopedia for WikipediaEncyclopedia {
    async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let resp = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", limit.as_str()),
                ("namespace", "0"),
                ("format", "json"),
            ])
            .send()
            .await
            .context("Wikipedia opensearch failed")?
            .error_for_status()?;
        let value: serde_json::Value = resp.json().await.context("Invalid opensearch reply")?;
        let titles = parse_opensearch(&value);
        debug!(query, count = titles.len(), "Wikipedia title search");
        Ok(titles)
    }

    async fn page_summary(&self, title: &str) -> Result<Option<EncyclopediaPage>> {
        let mut endpoint = url::Url::parse(&format!("{}/api/rest_v1/page/summary/", self.base_url))
            .context("Invalid Wikipedia base URL")?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Wikipedia base URL cannot be a base"))?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));

        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .context("Wikipedia summary request failed")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let summary: Summary = resp
            .error_for_status()?
            .json()
            .await
            .context("Invalid Wikipedia summary")?;
        Ok(into_page(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opensearch_titles_come_from_second_slot() {
        let value = json!(["maersk", ["Maersk", "Maersk Line"], ["", ""], ["u1", "u2"]]);
        assert_eq!(parse_opensearch(&value), vec!["Maersk", "Maersk Line"]);
        assert!(parse_opensearch(&json!({})).is_empty());
    }

    #[test]
    fn disambiguation_pages_are_dropped() {
        let summary: Summary = serde_json::from_value(json!({
            "title": "Holm",
            "type": "disambiguation",
            "extract": "Holm may refer to:"
        }))
        .unwrap();
        assert!(into_page(summary).is_none());
    }

    #[test]
    fn standard_page_keeps_description_and_url() {
        let summary: Summary = serde_json::from_value(json!({
            "title": "Novo Nordisk",
            "type": "standard",
            "description": "Danish pharmaceutical company",
            "extract": "Novo Nordisk A/S is a Danish multinational pharmaceutical company.",
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Novo_Nordisk"}}
        }))
        .unwrap();
        let page = into_page(summary).unwrap();
        assert_eq!(page.description.as_deref(), Some("Danish pharmaceutical company"));
        assert_eq!(page.url.as_deref(), Some("https://en.wikipedia.org/wiki/Novo_Nordisk"));
    }
}
