use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;
use wealthsignal_common::{Article, SynthesizedEvent};

const FEED_CAPACITY: usize = 256;

/// Something just committed that live listeners may want.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedItem {
    Event(SynthesizedEvent),
    Article {
        id: Uuid,
        link: String,
        headline: String,
        country: String,
        relevance: i32,
    },
}

impl From<&Article> for FeedItem {
    fn from(a: &Article) -> Self {
        FeedItem::Article {
            id: a.id,
            link: a.link.clone(),
            headline: a.headline.clone(),
            country: a.country.clone(),
            relevance: a.best_relevance(),
        }
    }
}

/// In-process broadcast of committed items. Publishing with no listeners is
/// not an error.
#[derive(Clone)]
pub struct RealtimeFeed {
    sender: broadcast::Sender<FeedItem>,
}

impl Default for RealtimeFeed {
    fn default() -> Self {
        Self::new(FEED_CAPACITY)
    }
}

impl RealtimeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedItem> {
        self.sender.subscribe()
    }

    /// Number of listeners that received the item.
    pub fn publish(&self, item: FeedItem) -> usize {
        self.sender.send(item).unwrap_or(0)
    }
}
