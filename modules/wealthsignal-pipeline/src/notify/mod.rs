pub mod channel;
pub mod dispatch;
pub mod email;
pub mod push;
pub mod realtime;
pub mod supervisor;

pub use channel::{ChannelKind, DeliveryOutcome, Digest, NotificationChannel};
pub use dispatch::{dispatch, DispatchReport};
pub use email::ResendEmail;
pub use push::WebhookPush;
pub use realtime::{FeedItem, RealtimeFeed};
pub use supervisor::{NoopSupervisor, SlackSupervisor, SupervisorAlert, SupervisorBackend};
