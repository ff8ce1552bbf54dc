//! Opportunity extraction: who should a banker call after this article?
//!
//! Extraction, then vague-name disambiguation, then the acceptance policy.
//! Rejected candidates are dropped here and never reach the store.

pub mod disambiguation;
pub mod extractor;
pub mod policy;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;
use wealthsignal_common::{normalize_name, Article, ContactDetails, Opportunity, Thresholds};

use crate::pipeline::workers::WorkerPool;
use crate::traits::{IntelligenceService, WebSearcher};

pub use extractor::ContactCandidate;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContactReport {
    pub articles_considered: u32,
    pub accepted: u32,
    pub rejected_stop_list: u32,
    pub rejected_wealth: u32,
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StopListed,
    BelowWealthFloor,
}

/// Apply the acceptance policy to one candidate.
pub fn accept(candidate: &ContactCandidate, thresholds: &Thresholds) -> Result<(), Rejection> {
    if policy::is_stop_listed(&candidate.name) {
        return Err(Rejection::StopListed);
    }
    if !policy::clears_wealth_floor(candidate.likely_mm_dollar_wealth, thresholds.min_opportunity_wealth_mm) {
        return Err(Rejection::BelowWealthFloor);
    }
    Ok(())
}

pub fn to_opportunity(candidate: ContactCandidate, article: &Article, now: DateTime<Utc>) -> Opportunity {
    let reason = if candidate.why_contact.trim().is_empty() {
        format!("Named in: {}", article.headline)
    } else {
        candidate.why_contact.trim().to_string()
    };
    Opportunity {
        id: Uuid::new_v4(),
        reach_out_to: candidate.name.trim().to_string(),
        contact_details: ContactDetails {
            email: candidate.email_suggestion.filter(|e| e.contains('@')),
            role: candidate.role.filter(|r| !r.trim().is_empty()),
            company: candidate.company.filter(|c| !c.trim().is_empty()),
        },
        based_in: candidate
            .based_in
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| article.country.clone()),
        why_contact: vec![reason],
        likely_mm_dollar_wealth: candidate.likely_mm_dollar_wealth,
        source_article_id: Some(article.id),
        source_event_id: None,
        emailed: false,
        email_sent_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Opportunities from every article that clears the event threshold. Within
/// one run the same person found twice is merged before commit.
pub async fn extract_opportunities(
    intelligence: &dyn IntelligenceService,
    searcher: &dyn WebSearcher,
    workers: &WorkerPool,
    articles: &[Article],
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> (Vec<Opportunity>, ContactReport) {
    let eligible: Vec<&Article> = articles
        .iter()
        .filter(|a| a.relevance_article.unwrap_or(0) >= thresholds.article_relevance_for_events)
        .collect();
    let mut report = ContactReport {
        articles_considered: eligible.len() as u32,
        ..Default::default()
    };

    let outcomes = workers
        .settle_all("extract_contacts", eligible.clone(), |article| async move {
            let mut resolved = Vec::new();
            for candidate in extractor::extract_candidates(intelligence, article).await {
                resolved.push(disambiguation::disambiguate(intelligence, searcher, candidate).await);
            }
            Ok(resolved)
        })
        .await;

    let mut by_name: HashMap<String, Opportunity> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for (outcome, article) in outcomes.into_iter().zip(eligible) {
        let Some(candidates) = outcome.done() else {
            continue;
        };
        for candidate in candidates {
            match accept(&candidate, thresholds) {
                Ok(()) => {}
                Err(Rejection::StopListed) => {
                    debug!(name = candidate.name.as_str(), link = article.link.as_str(), "Contact stop-listed");
                    report.rejected_stop_list += 1;
                    continue;
                }
                Err(Rejection::BelowWealthFloor) => {
                    debug!(
                        name = candidate.name.as_str(),
                        wealth = candidate.likely_mm_dollar_wealth,
                        "Contact below wealth floor"
                    );
                    report.rejected_wealth += 1;
                    continue;
                }
            }
            report.accepted += 1;
            let opportunity = to_opportunity(candidate, article, now);
            let key = normalize_name(&opportunity.reach_out_to);
            match by_name.get_mut(&key) {
                Some(existing) => existing.merge_discovery(&opportunity),
                None => {
                    order.push(key.clone());
                    by_name.insert(key, opportunity);
                }
            }
        }
    }

    let opportunities: Vec<Opportunity> = order.into_iter().filter_map(|k| by_name.remove(&k)).collect();
    info!(
        articles = report.articles_considered,
        opportunities = opportunities.len(),
        rejected_stop_list = report.rejected_stop_list,
        rejected_wealth = report.rejected_wealth,
        "Contact extraction complete"
    );
    (opportunities, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::traits::IntelligenceTask;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn enriched(link: &str, score: i32) -> Article {
        let mut a = stored_article(link, "Familien Holm sælger Danske Rør til kapitalfond", 85);
        a.relevance_article = Some(score);
        a.article_content = Some("Familien Holm sælger.".to_string());
        a
    }

    #[tokio::test]
    async fn policy_filters_and_same_person_merges() {
        let intelligence = MockIntelligence::new().on(IntelligenceTask::ContactExtraction, |_| {
            Ok(json!([
                {"name": "Jens Holm", "why_contact": "Sold Danske Rør", "likely_mm_dollar_wealth": 130},
                {"name": "The Family", "why_contact": "x", "likely_mm_dollar_wealth": 500},
                {"name": "Ole Small", "why_contact": "x", "likely_mm_dollar_wealth": 30}
            ]))
        });
        let workers = WorkerPool::new(2, Arc::new(AtomicBool::new(false)));
        let articles = vec![enriched("https://a/1", 90), enriched("https://a/2", 70), enriched("https://a/3", 40)];

        let (opportunities, report) = extract_opportunities(
            &intelligence,
            &MockSearcher::new(),
            &workers,
            &articles,
            &Thresholds::default(),
            Utc::now(),
        )
        .await;

        assert_eq!(report.articles_considered, 2);
        assert_eq!(report.rejected_stop_list, 2);
        assert_eq!(report.rejected_wealth, 2);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].reach_out_to, "Jens Holm");
        assert_eq!(opportunities[0].why_contact, vec!["Sold Danske Rør"]);
        assert_eq!(opportunities[0].based_in, "Denmark");
    }

    #[test]
    fn acceptance_requires_name_and_wealth() {
        let t = Thresholds::default();
        let mut c = ContactCandidate {
            name: "Jens Holm".to_string(),
            role: None,
            company: None,
            based_in: None,
            why_contact: String::new(),
            likely_mm_dollar_wealth: 31.0,
            email_suggestion: Some("not-an-email".to_string()),
        };
        assert_eq!(accept(&c, &t), Ok(()));
        let opp = to_opportunity(c.clone(), &enriched("https://a/1", 90), Utc::now());
        assert!(opp.contact_details.email.is_none());
        assert!(opp.why_contact[0].starts_with("Named in:"));

        c.likely_mm_dollar_wealth = 12.0;
        assert_eq!(accept(&c, &t), Err(Rejection::BelowWealthFloor));
        c.name = "investors".to_string();
        assert_eq!(accept(&c, &t), Err(Rejection::StopListed));
    }
}
