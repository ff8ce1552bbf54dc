use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;
use wealthsignal_common::{normalize_name, truncate_words, Article, KeyIndividual, SynthesizedEvent};

use super::entities::EntityContext;
use super::grouping::Cluster;
use super::rag::HistoricalArticle;
use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask};

const MEMBER_CONTENT_CHARS: usize = 4_000;
const HISTORICAL_CONTENT_CHARS: usize = 800;

#[derive(Debug, Deserialize)]
struct Brief {
    synthesized_headline: String,
    synthesized_summary: String,
    #[serde(default)]
    ai_assessment_reason: String,
    #[serde(default)]
    key_individuals: Vec<KeyIndividual>,
}

fn top_member(cluster: &Cluster) -> Option<&Article> {
    cluster.members.iter().max_by_key(|a| a.best_relevance())
}

/// One entry per person. Later mentions only replace earlier ones when they
/// carry an email suggestion the earlier one lacked.
pub fn dedupe_individuals(individuals: impl IntoIterator<Item = KeyIndividual>) -> Vec<KeyIndividual> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, KeyIndividual> = HashMap::new();
    for person in individuals {
        let key = normalize_name(&person.name);
        if key.is_empty() {
            continue;
        }
        match by_name.get_mut(&key) {
            Some(existing) => {
                if existing.email_suggestion.is_none() && person.email_suggestion.is_some() {
                    existing.email_suggestion = person.email_suggestion;
                }
                if existing.role_in_event.is_empty() {
                    existing.role_in_event = person.role_in_event;
                }
                if existing.company.is_empty() {
                    existing.company = person.company;
                }
            }
            None => {
                order.push(key.clone());
                by_name.insert(key, person);
            }
        }
    }
    order.into_iter().filter_map(|k| by_name.remove(&k)).collect()
}

fn build_prompt(cluster: &Cluster, historical: &[HistoricalArticle], entities: &[EntityContext]) -> String {
    let mut user = String::from("TODAY'S ARTICLES\n");
    for (i, a) in cluster.members.iter().enumerate() {
        user.push_str(&format!(
            "\n[{}] {} ({}, {})\nAssessment: {}\n{}\n",
            i + 1,
            a.headline,
            a.newspaper,
            a.country,
            a.assessment_article.as_deref().unwrap_or(&a.assessment_headline),
            ai_client::truncate_to_char_boundary(a.article_content.as_deref().unwrap_or_default(), MEMBER_CONTENT_CHARS),
        ));
    }
    if !historical.is_empty() {
        user.push_str("\nHISTORICAL CONTEXT\n");
        for h in historical {
            user.push_str(&format!(
                "\n- {} ({}, similarity {:.2})\n{}\n",
                h.article.headline,
                h.article.created_at.format("%Y-%m-%d"),
                h.similarity,
                ai_client::truncate_to_char_boundary(
                    h.article.assessment_article.as_deref().unwrap_or(&h.article.assessment_headline),
                    HISTORICAL_CONTENT_CHARS
                ),
            ));
        }
    }
    if !entities.is_empty() {
        user.push_str("\nENCYCLOPEDIA CONTEXT\n");
        for e in entities {
            user.push_str(&format!(
                "\n- {} ({}): {}\n",
                e.title,
                e.description.as_deref().unwrap_or("no description"),
                e.extract
            ));
        }
    }
    user
}

/// One canonical brief for a cluster. When the service fails or answers
/// badly, the brief falls back to the highest-scoring member.
pub async fn synthesize(
    intelligence: &dyn IntelligenceService,
    cluster: &Cluster,
    historical: &[HistoricalArticle],
    entities: &[EntityContext],
    summary_max_words: usize,
    now: DateTime<Utc>,
) -> Option<SynthesizedEvent> {
    let top = top_member(cluster)?;

    let request = IntelligenceRequest::new(
        IntelligenceTask::EventSynthesis,
        prompts::EVENT_SYNTHESIS_SYSTEM,
        build_prompt(cluster, historical, entities),
    );
    let brief = match intelligence.complete_json(&request).await {
        Ok(value) => serde_json::from_value::<Brief>(value)
            .map_err(|e| e.to_string())
            .and_then(|b| {
                if b.synthesized_headline.trim().is_empty() {
                    Err("empty headline".to_string())
                } else {
                    Ok(b)
                }
            }),
        Err(e) => Err(e.to_string()),
    };

    let (headline, summary, reason, individuals) = match brief {
        Ok(b) => (
            b.synthesized_headline.trim().to_string(),
            b.synthesized_summary,
            b.ai_assessment_reason,
            b.key_individuals,
        ),
        Err(reason) => {
            warn!(event_key = cluster.event_key.as_str(), reason = reason.as_str(), "Synthesis fell back to top article");
            let fallback_summary = top
                .assessment_article
                .clone()
                .or_else(|| top.article_content.clone())
                .unwrap_or_else(|| top.assessment_headline.clone());
            (
                top.headline.clone(),
                fallback_summary,
                top.assessment_article
                    .clone()
                    .unwrap_or_else(|| top.assessment_headline.clone()),
                Vec::new(),
            )
        }
    };

    let key_individuals = dedupe_individuals(
        individuals
            .into_iter()
            .chain(cluster.members.iter().flat_map(|a| a.key_individuals.iter().cloned())),
    );

    Some(SynthesizedEvent {
        id: Uuid::new_v4(),
        event_key: cluster.event_key.clone(),
        synthesized_headline: headline,
        synthesized_summary: truncate_words(&summary, summary_max_words),
        ai_assessment_reason: reason,
        country: top.country.clone(),
        source_articles: cluster.members.iter().map(Article::source_ref).collect(),
        highest_relevance_score: cluster
            .members
            .iter()
            .map(Article::best_relevance)
            .max()
            .unwrap_or(0),
        key_individuals,
        emailed: false,
        email_sent_at: None,
        created_at: now,
        updated_at: now,
    })
}
