use async_trait::async_trait;
use serde::Serialize;
use wealthsignal_common::{Opportunity, Subscriber, SynthesizedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Push,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Push => write!(f, "push"),
        }
    }
}

impl ChannelKind {
    pub fn enabled_for(&self, subscriber: &Subscriber) -> bool {
        match self {
            ChannelKind::Email => subscriber.email_notifications_enabled,
            ChannelKind::Push => subscriber.push_notifications_enabled,
        }
    }
}

/// What one subscriber receives from one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Digest {
    pub events: Vec<SynthesizedEvent>,
    pub opportunities: Vec<Opportunity>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.opportunities.is_empty()
    }

    pub fn subject(&self) -> String {
        match (self.events.len(), self.opportunities.len()) {
            (1, 0) => self.events[0].synthesized_headline.clone(),
            (e, o) => format!("WealthSignal: {e} new event(s), {o} new opportunit(ies)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// Not attempted: non-production environment.
    Skipped,
    Failed,
}

/// A delivery channel for subscriber digests.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, subscriber: &Subscriber, digest: &Digest) -> anyhow::Result<()>;
}
