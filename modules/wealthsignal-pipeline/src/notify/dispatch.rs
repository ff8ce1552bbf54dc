use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wealthsignal_common::{Environment, Opportunity, Subscriber, SynthesizedEvent};
use wealthsignal_store::DocumentStore;

use super::channel::{ChannelKind, DeliveryOutcome, Digest, NotificationChannel};

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct DispatchReport {
    pub subscribers: u32,
    pub no_overlap: u32,
    pub sent: u32,
    pub skipped: u32,
    pub failed: u32,
    pub events_marked: u32,
    pub opportunities_marked: u32,
}

/// The slice of this run's new items a subscriber follows.
pub fn digest_for(
    subscriber: &Subscriber,
    events: &[SynthesizedEvent],
    opportunities: &[Opportunity],
    opportunity_countries: &HashMap<Uuid, String>,
) -> Digest {
    Digest {
        events: events
            .iter()
            .filter(|e| subscriber.follows_country(&e.country))
            .cloned()
            .collect(),
        opportunities: opportunities
            .iter()
            .filter(|o| {
                let country = opportunity_countries
                    .get(&o.id)
                    .map(String::as_str)
                    .unwrap_or(o.based_in.as_str());
                subscriber.follows_country(country)
            })
            .cloned()
            .collect(),
    }
}

async fn deliver(
    channel: &dyn NotificationChannel,
    environment: Environment,
    subscriber: &Subscriber,
    digest: &Digest,
) -> DeliveryOutcome {
    if !environment.is_production() {
        debug!(channel = %channel.kind(), subscriber = %subscriber.id, "Non-production, send skipped");
        return DeliveryOutcome::Skipped;
    }
    match channel.send(subscriber, digest).await {
        Ok(()) => DeliveryOutcome::Sent,
        Err(e) => {
            warn!(channel = %channel.kind(), subscriber = %subscriber.id, error = %e, "Delivery failed");
            DeliveryOutcome::Failed
        }
    }
}

/// Fan newly committed, not-yet-emailed items out to subscribers by country
/// and channel preference. An item is marked emailed only when every email
/// carrying it went out; one failed email leaves it unmarked for everyone.
pub async fn dispatch(
    store: &dyn DocumentStore,
    channels: &[Arc<dyn NotificationChannel>],
    environment: Environment,
    events: &[SynthesizedEvent],
    opportunities: &[Opportunity],
    opportunity_countries: &HashMap<Uuid, String>,
    now: DateTime<Utc>,
) -> Result<DispatchReport> {
    let mut report = DispatchReport::default();
    if events.is_empty() && opportunities.is_empty() {
        info!("Nothing new to notify");
        return Ok(report);
    }

    let subscribers = store
        .active_subscribers()
        .await
        .context("loading subscribers")?;
    report.subscribers = subscribers.len() as u32;

    let mut emailed_events: BTreeSet<Uuid> = BTreeSet::new();
    let mut emailed_opportunities: BTreeSet<Uuid> = BTreeSet::new();
    let mut withheld_events: BTreeSet<Uuid> = BTreeSet::new();
    let mut withheld_opportunities: BTreeSet<Uuid> = BTreeSet::new();

    for subscriber in &subscribers {
        let digest = digest_for(subscriber, events, opportunities, opportunity_countries);
        if digest.is_empty() {
            report.no_overlap += 1;
            continue;
        }
        for channel in channels {
            if !channel.kind().enabled_for(subscriber) {
                continue;
            }
            match deliver(channel.as_ref(), environment, subscriber, &digest).await {
                DeliveryOutcome::Sent => {
                    report.sent += 1;
                    if channel.kind() == ChannelKind::Email {
                        emailed_events.extend(digest.events.iter().map(|e| e.id));
                        emailed_opportunities.extend(digest.opportunities.iter().map(|o| o.id));
                    }
                }
                DeliveryOutcome::Skipped => report.skipped += 1,
                DeliveryOutcome::Failed => {
                    report.failed += 1;
                    if channel.kind() == ChannelKind::Email {
                        withheld_events.extend(digest.events.iter().map(|e| e.id));
                        withheld_opportunities.extend(digest.opportunities.iter().map(|o| o.id));
                    }
                }
            }
        }
    }

    if !withheld_events.is_empty() || !withheld_opportunities.is_empty() {
        warn!(
            events = withheld_events.len(),
            opportunities = withheld_opportunities.len(),
            "Email failed for some subscribers, affected items left unmarked"
        );
    }
    let emailed_events: Vec<Uuid> = emailed_events.difference(&withheld_events).copied().collect();
    let emailed_opportunities: Vec<Uuid> = emailed_opportunities
        .difference(&withheld_opportunities)
        .copied()
        .collect();

    if !emailed_events.is_empty() {
        let ids = emailed_events;
        match store.mark_events_emailed(&ids, now).await {
            Ok(()) => report.events_marked = ids.len() as u32,
            Err(e) => warn!(error = %e, count = ids.len(), "Failed to mark events emailed"),
        }
    }
    if !emailed_opportunities.is_empty() {
        let ids = emailed_opportunities;
        match store.mark_opportunities_emailed(&ids, now).await {
            Ok(()) => report.opportunities_marked = ids.len() as u32,
            Err(e) => warn!(error = %e, count = ids.len(), "Failed to mark opportunities emailed"),
        }
    }

    info!(
        subscribers = report.subscribers,
        no_overlap = report.no_overlap,
        sent = report.sent,
        skipped = report.skipped,
        failed = report.failed,
        "Notification fan-out complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use wealthsignal_store::MemoryStore;

    fn event_in(country: &str) -> SynthesizedEvent {
        let now = Utc::now();
        SynthesizedEvent {
            id: Uuid::new_v4(),
            event_key: format!("deal-{country}"),
            synthesized_headline: format!("Deal in {country}"),
            synthesized_summary: "s".to_string(),
            ai_assessment_reason: "r".to_string(),
            country: country.to_string(),
            source_articles: vec![],
            highest_relevance_score: 90,
            key_individuals: vec![],
            emailed: false,
            email_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn no_country_overlap_sends_nothing() {
        let store = MemoryStore::new().with_subscribers(vec![subscriber("nora@bank.no", &["Norway"])]);
        let email = Arc::new(RecordingChannel::email());
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![email.clone()];

        let report = dispatch(
            &store,
            &channels,
            Environment::Production,
            &[event_in("Denmark"), event_in("Denmark")],
            &[],
            &HashMap::new(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(report.no_overlap, 1);
        assert_eq!(report.sent, 0);
        assert!(email.deliveries().is_empty());
    }

    #[tokio::test]
    async fn marks_emailed_only_after_successful_send() {
        let store = MemoryStore::new().with_subscribers(vec![
            subscriber("dana@bank.dk", &["Denmark"]),
            subscriber("sven@bank.se", &["Sweden"]),
        ]);
        let dk = event_in("Denmark");
        let se = event_in("Sweden");
        store.upsert_event(&dk).await.unwrap();
        store.upsert_event(&se).await.unwrap();
        let email = Arc::new(RecordingChannel::email().failing_for("sven@bank.se"));
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![email.clone()];

        let report = dispatch(
            &store,
            &channels,
            Environment::Production,
            &[dk.clone(), se.clone()],
            &[],
            &HashMap::new(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        let stored: HashMap<String, bool> = store.events().into_iter().map(|e| (e.event_key, e.emailed)).collect();
        assert!(stored["deal-Denmark"]);
        assert!(!stored["deal-Sweden"]);
    }

    #[tokio::test]
    async fn one_failed_email_keeps_a_shared_event_unmarked() {
        let store = MemoryStore::new().with_subscribers(vec![
            subscriber("dana@bank.dk", &["Denmark"]),
            subscriber("mads@fond.dk", &["Denmark"]),
        ]);
        let dk = event_in("Denmark");
        store.upsert_event(&dk).await.unwrap();
        let email = Arc::new(RecordingChannel::email().failing_for("mads@fond.dk"));
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![email.clone()];

        let report = dispatch(&store, &channels, Environment::Production, &[dk], &[], &HashMap::new(), Utc::now())
            .await
            .unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.events_marked, 0);
        assert!(!store.events()[0].emailed);
    }

    #[tokio::test]
    async fn development_skips_without_marking() {
        let store = MemoryStore::new().with_subscribers(vec![subscriber("dana@bank.dk", &["denmark"])]);
        let ev = event_in("Denmark");
        store.upsert_event(&ev).await.unwrap();
        let email = Arc::new(RecordingChannel::email());
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![email.clone()];

        let report = dispatch(&store, &channels, Environment::Development, &[ev], &[], &HashMap::new(), Utc::now())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(email.deliveries().is_empty());
        assert!(!store.events()[0].emailed);
    }
}
