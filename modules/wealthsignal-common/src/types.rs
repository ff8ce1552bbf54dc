use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Sources ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Paused,
    Broken,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Paused => write!(f, "paused"),
            SourceStatus::Broken => write!(f, "broken"),
        }
    }
}

/// Scraping configuration for one news outlet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: Uuid,
    /// Stable identifier used for strategy dispatch and health tracking.
    pub key: String,
    /// Outlet name as it appears on articles (the `newspaper` field).
    pub name: String,
    pub base_url: String,
    /// Listing page to scrape. Usually the front page or a business section.
    pub start_url: String,
    pub country: String,
    pub status: SourceStatus,
    /// Explicit strategy name; falls back to the registry entry for `key`.
    #[serde(default)]
    pub strategy: Option<String>,
    /// CSS selector for headline elements on the listing page.
    #[serde(default)]
    pub headline_selector: Option<String>,
    /// CSS selector for the link, relative to the headline element.
    #[serde(default)]
    pub link_selector: Option<String>,
    /// CSS selectors for the article body on article pages.
    #[serde(default)]
    pub article_selectors: Vec<String>,
    #[serde(default)]
    pub last_scraped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl SourceConfig {
    pub fn is_active(&self) -> bool {
        self.status == SourceStatus::Active
    }
}

// --- Headlines & articles ---

/// A headline as it comes off a listing page, before it enters the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHeadline {
    pub headline: String,
    pub link: String,
    pub newspaper: String,
    pub country: String,
}

/// A person named in an article or event brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyIndividual {
    pub name: String,
    #[serde(default)]
    pub role_in_event: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email_suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMethod {
    /// Body fetched from the original outlet.
    Direct,
    /// Body fetched from an alternate outlet carrying the same story.
    Verified,
    /// Synthetic summary generated from the headline alone.
    Salvaged,
}

pub const AWAITING_ASSESSMENT: &str = "Awaiting assessment";

/// Persisted article document. `link` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub link: String,
    pub headline: String,
    pub newspaper: String,
    pub country: String,
    pub relevance_headline: i32,
    pub assessment_headline: String,
    #[serde(default)]
    pub article_content: Option<String>,
    #[serde(default)]
    pub relevance_article: Option<i32>,
    #[serde(default)]
    pub assessment_article: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub key_individuals: Vec<KeyIndividual>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub enrichment_method: Option<EnrichmentMethod>,
    /// Alternate link the body was taken from, for verified articles.
    #[serde(default)]
    pub enriched_from: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// A fresh skeletal record for a candidate that has never been seen.
    pub fn skeletal(candidate: CandidateHeadline, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            link: candidate.link,
            headline: candidate.headline,
            newspaper: candidate.newspaper,
            country: candidate.country,
            relevance_headline: 0,
            assessment_headline: AWAITING_ASSESSMENT.to_string(),
            article_content: None,
            relevance_article: None,
            assessment_article: None,
            topic: None,
            key_individuals: Vec::new(),
            embedding: None,
            enrichment_method: None,
            enriched_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Article-level score when present, else the headline score.
    pub fn best_relevance(&self) -> i32 {
        self.relevance_article.unwrap_or(self.relevance_headline)
    }

    pub fn source_ref(&self) -> SourceArticleRef {
        SourceArticleRef {
            headline: self.headline.clone(),
            link: self.link.clone(),
            newspaper: self.newspaper.clone(),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment_method.is_some()
    }
}

// --- Events ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceArticleRef {
    pub headline: String,
    pub link: String,
    pub newspaper: String,
}

/// One intelligence brief per real-world event. `event_key` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedEvent {
    pub id: Uuid,
    pub event_key: String,
    pub synthesized_headline: String,
    pub synthesized_summary: String,
    pub ai_assessment_reason: String,
    pub country: String,
    pub source_articles: Vec<SourceArticleRef>,
    pub highest_relevance_score: i32,
    pub key_individuals: Vec<KeyIndividual>,
    #[serde(default)]
    pub emailed: bool,
    #[serde(default)]
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Opportunities ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// A person worth reaching out to. `reach_out_to` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub reach_out_to: String,
    pub contact_details: ContactDetails,
    pub based_in: String,
    /// Rationale history, newest first. Never shrinks.
    pub why_contact: Vec<String>,
    pub likely_mm_dollar_wealth: f64,
    #[serde(default)]
    pub source_article_id: Option<Uuid>,
    #[serde(default)]
    pub source_event_id: Option<Uuid>,
    #[serde(default)]
    pub emailed: bool,
    #[serde(default)]
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    /// Fold a rediscovery of the same person into this (stored) record.
    ///
    /// Wealth is max-merged. Reasons not already in the history are prepended
    /// in discovery order; nothing is ever removed. Identity, creation time
    /// and delivery state stay with the stored record.
    pub fn merge_discovery(&mut self, discovery: &Opportunity) {
        self.likely_mm_dollar_wealth = self
            .likely_mm_dollar_wealth
            .max(discovery.likely_mm_dollar_wealth);

        let fresh: Vec<String> = discovery
            .why_contact
            .iter()
            .filter(|reason| !self.why_contact.contains(reason))
            .cloned()
            .collect();
        if !fresh.is_empty() {
            let mut merged = fresh;
            merged.append(&mut self.why_contact);
            self.why_contact = merged;
        }

        let details = &mut self.contact_details;
        if details.email.is_none() {
            details.email = discovery.contact_details.email.clone();
        }
        if details.role.is_none() {
            details.role = discovery.contact_details.role.clone();
        }
        if details.company.is_none() {
            details.company = discovery.contact_details.company.clone();
        }
        if self.based_in.trim().is_empty() {
            self.based_in = discovery.based_in.clone();
        }
        if discovery.source_article_id.is_some() {
            self.source_article_id = discovery.source_article_id;
        }
        if discovery.source_event_id.is_some() {
            self.source_event_id = discovery.source_event_id;
        }
        self.updated_at = self.updated_at.max(discovery.updated_at);
    }
}

// --- Subscribers ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub countries: Vec<String>,
    pub email_notifications_enabled: bool,
    pub push_notifications_enabled: bool,
    pub is_active: bool,
}

impl Subscriber {
    /// Case-insensitive interest check.
    pub fn follows_country(&self, country: &str) -> bool {
        self.countries
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(country.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(name: &str, wealth: f64, reasons: &[&str]) -> Opportunity {
        let now = Utc::now();
        Opportunity {
            id: Uuid::new_v4(),
            reach_out_to: name.to_string(),
            contact_details: ContactDetails::default(),
            based_in: "Denmark".to_string(),
            why_contact: reasons.iter().map(|r| r.to_string()).collect(),
            likely_mm_dollar_wealth: wealth,
            source_article_id: None,
            source_event_id: None,
            emailed: false,
            email_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn merge_never_lowers_wealth() {
        let mut stored = opportunity("Anders Holch Povlsen", 500.0, &["Sold stake"]);
        stored.merge_discovery(&opportunity("Anders Holch Povlsen", 120.0, &["New fund"]));
        assert_eq!(stored.likely_mm_dollar_wealth, 500.0);

        stored.merge_discovery(&opportunity("Anders Holch Povlsen", 900.0, &["Dividend"]));
        assert_eq!(stored.likely_mm_dollar_wealth, 900.0);
    }

    #[test]
    fn merge_prepends_new_reasons_and_keeps_history() {
        let mut stored = opportunity("Jane Founder", 50.0, &["Sold company to PE fund"]);
        stored.merge_discovery(&opportunity("Jane Founder", 50.0, &["Joined board of bank"]));
        assert_eq!(
            stored.why_contact,
            vec!["Joined board of bank", "Sold company to PE fund"]
        );
    }

    #[test]
    fn merge_with_same_reason_is_stable() {
        let mut stored = opportunity("Jane Founder", 50.0, &["Sold company"]);
        let before = stored.why_contact.len();
        stored.merge_discovery(&opportunity("Jane Founder", 50.0, &["Sold company"]));
        assert_eq!(stored.why_contact.len(), before);
    }

    #[test]
    fn merge_keeps_identity_and_fills_missing_details() {
        let mut stored = opportunity("Jane Founder", 50.0, &["a"]);
        let stored_id = stored.id;
        let mut discovery = opportunity("Jane Founder", 10.0, &["b"]);
        discovery.contact_details.email = Some("jane@acme.dk".to_string());
        stored.merge_discovery(&discovery);
        assert_eq!(stored.id, stored_id);
        assert_eq!(stored.contact_details.email.as_deref(), Some("jane@acme.dk"));
    }

    #[test]
    fn subscriber_country_match_is_case_insensitive() {
        let sub = Subscriber {
            id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            countries: vec!["Norway".to_string()],
            email_notifications_enabled: true,
            push_notifications_enabled: false,
            is_active: true,
        };
        assert!(sub.follows_country("norway"));
        assert!(!sub.follows_country("Denmark"));
    }

    #[test]
    fn skeletal_article_awaits_assessment() {
        let article = Article::skeletal(
            CandidateHeadline {
                headline: "Familien sælger rederi for 2 mia.".to_string(),
                link: "https://borsen.dk/a/1".to_string(),
                newspaper: "Børsen".to_string(),
                country: "Denmark".to_string(),
            },
            Utc::now(),
        );
        assert_eq!(article.relevance_headline, 0);
        assert_eq!(article.assessment_headline, AWAITING_ASSESSMENT);
        assert!(!article.is_enriched());
        assert_eq!(article.best_relevance(), 0);
    }
}
