use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::pipeline::stats::RunStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorAlert {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
}

impl SupervisorAlert {
    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Operational channel for the people running the pipeline.
#[async_trait]
pub trait SupervisorBackend: Send + Sync {
    async fn alert(&self, alert: &SupervisorAlert) -> anyhow::Result<()>;

    /// Summary of a finished run.
    async fn send_digest(&self, stats: &RunStats) -> anyhow::Result<()>;
}

/// Slack incoming webhook backend.
pub struct SlackSupervisor {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackSupervisor {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    fn severity_emoji(severity: Severity) -> &'static str {
        match severity {
            Severity::Warning => ":warning:",
            Severity::Error => ":rotating_light:",
        }
    }

    async fn post(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }
        Ok(())
    }
}

#[async_trait]
impl SupervisorBackend for SlackSupervisor {
    async fn alert(&self, alert: &SupervisorAlert) -> anyhow::Result<()> {
        let text = format!(
            "{} *WealthSignal {}: {}*\n{}",
            Self::severity_emoji(alert.severity),
            alert.severity,
            alert.title,
            alert.detail
        );
        self.post(json!({ "text": text, "unfurl_links": false })).await
    }

    async fn send_digest(&self, stats: &RunStats) -> anyhow::Result<()> {
        let mut lines = vec![":newspaper: *WealthSignal Run Complete*".to_string()];
        lines.push(format!(
            "Sources: {}/{} healthy, {} headlines scraped, {} fresh",
            stats.sources_succeeded(),
            stats.source_health.len(),
            stats.headlines_scraped,
            stats.fresh_articles
        ));
        lines.push(format!(
            "Enriched: {} (direct={}, verified={}, salvaged={}), dropped {}",
            stats.enriched_total(),
            stats.enriched_direct,
            stats.enriched_verified,
            stats.enriched_salvaged,
            stats.enrichment_dropped
        ));
        lines.push(format!(
            "Events: {} committed, opportunities: {}",
            stats.events_committed, stats.opportunities_committed
        ));
        let broken: Vec<&str> = stats
            .source_health
            .iter()
            .filter(|s| !s.success)
            .map(|s| s.name.as_str())
            .collect();
        if !broken.is_empty() {
            lines.push(format!("_Sources with no headlines: {}_", broken.join(", ")));
        }
        self.post(json!({ "text": lines.join("\n"), "unfurl_links": false }))
            .await
    }
}

/// Used when no webhook is configured.
pub struct NoopSupervisor;

#[async_trait]
impl SupervisorBackend for NoopSupervisor {
    async fn alert(&self, _alert: &SupervisorAlert) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_digest(&self, _stats: &RunStats) -> anyhow::Result<()> {
        Ok(())
    }
}
