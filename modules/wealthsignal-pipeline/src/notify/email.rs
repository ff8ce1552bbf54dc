use async_trait::async_trait;
use serde_json::json;
use tracing::warn;
use wealthsignal_common::Subscriber;

use super::channel::{ChannelKind, Digest, NotificationChannel};

const RESEND_URL: &str = "https://api.resend.com/emails";

/// Email delivery through the Resend HTTP API.
pub struct ResendEmail {
    api_key: String,
    from: String,
    endpoint: String,
    http: reqwest::Client,
}

impl ResendEmail {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            endpoint: RESEND_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Plain-text body. One block per event, then the opportunities.
pub fn render_text(digest: &Digest) -> String {
    let mut lines = Vec::new();
    for event in &digest.events {
        lines.push(format!("{} [{}]", event.synthesized_headline, event.country));
        lines.push(event.synthesized_summary.clone());
        lines.push(format!("Why it matters: {}", event.ai_assessment_reason));
        for source in &event.source_articles {
            lines.push(format!("  - {} ({}) {}", source.headline, source.newspaper, source.link));
        }
        lines.push(String::new());
    }
    if !digest.opportunities.is_empty() {
        lines.push("Opportunities".to_string());
        for opp in &digest.opportunities {
            let reason = opp.why_contact.first().map(String::as_str).unwrap_or_default();
            lines.push(format!(
                "  - {} ({}), ~${:.0}M: {}",
                opp.reach_out_to, opp.based_in, opp.likely_mm_dollar_wealth, reason
            ));
        }
    }
    lines.join("\n")
}

#[async_trait]
impl NotificationChannel for ResendEmail {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, subscriber: &Subscriber, digest: &Digest) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [subscriber.email],
            "subject": digest.subject(),
            "text": render_text(digest),
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Email API returned non-success");
            anyhow::bail!("Email API returned {status}");
        }
        Ok(())
    }
}
