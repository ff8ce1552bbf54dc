use async_trait::async_trait;
use serde_json::json;
use tracing::warn;
use wealthsignal_common::Subscriber;

use super::channel::{ChannelKind, Digest, NotificationChannel};

/// Push delivery through a JSON webhook (the push gateway fans out to devices).
pub struct WebhookPush {
    url: String,
    http: reqwest::Client,
}

impl WebhookPush {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookPush {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, subscriber: &Subscriber, digest: &Digest) -> anyhow::Result<()> {
        let payload = json!({
            "subscriber_id": subscriber.id,
            "title": digest.subject(),
            "events": digest.events.iter().map(|e| json!({
                "id": e.id,
                "headline": e.synthesized_headline,
                "country": e.country,
            })).collect::<Vec<_>>(),
            "opportunities": digest.opportunities.iter().map(|o| json!({
                "id": o.id,
                "reach_out_to": o.reach_out_to,
            })).collect::<Vec<_>>(),
        });

        let resp = self.http.post(&self.url).json(&payload).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            warn!(status = %status, subscriber = %subscriber.id, "Push webhook returned non-success");
            anyhow::bail!("Push webhook returned {status}");
        }
        Ok(())
    }
}
