//! Relevance scoring for headlines (batched) and full articles (one at a time).
//!
//! Malformed output never propagates: a bad batch response defaults every
//! member of that batch to score 0 with a rationale saying why.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use wealthsignal_common::{Article, KeyIndividual};

use crate::pipeline::workers::{TaskOutcome, WorkerPool};
use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask};

/// Longest article body sent for article-level assessment, in bytes.
const MAX_ASSESSMENT_CONTENT: usize = 12_000;

#[derive(Debug, Default, Clone, Copy)]
pub struct AssessmentReport {
    pub batches: u32,
    pub failed_batches: u32,
}

#[derive(Debug, Deserialize)]
struct HeadlineScore {
    relevance_headline: i64,
    assessment_headline: String,
}

/// Score every article's headline in fixed-size batches. Output order
/// matches input order.
pub async fn assess_headlines(
    intelligence: &dyn IntelligenceService,
    workers: &WorkerPool,
    articles: Vec<Article>,
    batch_size: usize,
) -> (Vec<Article>, AssessmentReport) {
    let batches: Vec<Vec<Article>> = articles
        .chunks(batch_size.max(1))
        .map(|c| c.to_vec())
        .collect();
    let mut report = AssessmentReport {
        batches: batches.len() as u32,
        failed_batches: 0,
    };

    let outcomes = workers
        .settle_all("assess_headlines", batches.clone(), |batch| async move {
            Ok(assess_batch(intelligence, batch).await)
        })
        .await;

    let mut assessed = Vec::with_capacity(articles.len());
    for (outcome, original) in outcomes.into_iter().zip(batches) {
        match outcome {
            TaskOutcome::Done((batch, ok)) => {
                if !ok {
                    report.failed_batches += 1;
                }
                assessed.extend(batch);
            }
            TaskOutcome::Failed(reason) => {
                report.failed_batches += 1;
                assessed.extend(default_batch(original, &format!("assessment task failed: {reason}")));
            }
            TaskOutcome::Skipped => {
                report.failed_batches += 1;
                assessed.extend(default_batch(original, "run cancelled before assessment"));
            }
        }
    }

    info!(
        headlines = assessed.len(),
        batches = report.batches,
        failed_batches = report.failed_batches,
        "Headline assessment complete"
    );
    (assessed, report)
}

/// One intelligence call for one batch. Returns the batch and whether the
/// response was usable.
async fn assess_batch(intelligence: &dyn IntelligenceService, batch: Vec<Article>) -> (Vec<Article>, bool) {
    let input: Vec<Value> = batch
        .iter()
        .enumerate()
        .map(|(i, a)| {
            json!({
                "index": i,
                "headline": a.headline,
                "newspaper": a.newspaper,
                "country": a.country,
            })
        })
        .collect();

    let request = IntelligenceRequest::new(
        IntelligenceTask::HeadlineAssessment,
        prompts::HEADLINE_ASSESSMENT_SYSTEM,
        Value::Array(input).to_string(),
    )
    .with_examples(prompts::HEADLINE_ASSESSMENT_EXAMPLES);

    let scores = match intelligence.complete_json(&request).await {
        Ok(value) => parse_batch_scores(value, batch.len()),
        Err(e) => Err(format!("intelligence service error: {e}")),
    };

    match scores {
        Ok(scores) => {
            let assessed = batch
                .into_iter()
                .zip(scores)
                .map(|(mut article, (score, rationale))| {
                    article.relevance_headline = score;
                    article.assessment_headline = rationale;
                    article
                })
                .collect();
            (assessed, true)
        }
        Err(reason) => {
            warn!(size = batch.len(), reason = reason.as_str(), "Headline batch defaulted to zero");
            for article in &batch {
                debug!(link = article.link.as_str(), headline = article.headline.as_str(), "Defaulted headline");
            }
            (default_batch(batch, &reason), false)
        }
    }
}

/// Validate a batch response: an array of exactly `expected` well-formed
/// scores. Any deviation rejects the whole batch.
pub fn parse_batch_scores(value: Value, expected: usize) -> Result<Vec<(i32, String)>, String> {
    let Value::Array(items) = value else {
        return Err("response was not a JSON array".to_string());
    };
    if items.len() != expected {
        return Err(format!(
            "response length {} did not match batch size {expected}",
            items.len()
        ));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let score: HeadlineScore = serde_json::from_value(item)
                .map_err(|e| format!("item {i} malformed: {e}"))?;
            let rationale = score.assessment_headline.trim().to_string();
            if rationale.is_empty() {
                return Err(format!("item {i} had an empty rationale"));
            }
            Ok((score.relevance_headline.clamp(0, 100) as i32, rationale))
        })
        .collect()
}

fn default_batch(batch: Vec<Article>, reason: &str) -> Vec<Article> {
    batch
        .into_iter()
        .map(|mut article| {
            article.relevance_headline = 0;
            article.assessment_headline = format!("Defaulted to 0: {reason}");
            article
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Article-level assessment
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArticleScore {
    relevance_article: i64,
    #[serde(default)]
    assessment_article: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    key_individuals: Vec<KeyIndividual>,
}

/// Score a fetched article body in place. A malformed response leaves the
/// article with `relevance_article = 0` and a rationale.
pub async fn assess_article(intelligence: &dyn IntelligenceService, article: &mut Article) {
    let content = article.article_content.as_deref().unwrap_or_default();
    let user = format!(
        "Headline: {}\nNewspaper: {}\nCountry: {}\n\nArticle:\n{}",
        article.headline,
        article.newspaper,
        article.country,
        ai_client::truncate_to_char_boundary(content, MAX_ASSESSMENT_CONTENT),
    );
    let request = IntelligenceRequest::new(
        IntelligenceTask::ArticleAssessment,
        prompts::ARTICLE_ASSESSMENT_SYSTEM,
        user,
    );

    let parsed = match intelligence.complete_json(&request).await {
        Ok(value) => serde_json::from_value::<ArticleScore>(value).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match parsed {
        Ok(score) => {
            article.relevance_article = Some(score.relevance_article.clamp(0, 100) as i32);
            article.assessment_article = Some(if score.assessment_article.trim().is_empty() {
                "No rationale given".to_string()
            } else {
                score.assessment_article
            });
            article.topic = score.topic.filter(|t| !t.trim().is_empty());
            article.key_individuals = score
                .key_individuals
                .into_iter()
                .filter(|k| !k.name.trim().is_empty())
                .collect();
        }
        Err(reason) => {
            warn!(link = article.link.as_str(), reason = reason.as_str(), "Article assessment defaulted to zero");
            article.relevance_article = Some(0);
            article.assessment_article = Some(format!("Defaulted to 0: {reason}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_batch() {
        let value = json!([
            {"relevance_headline": 92, "assessment_headline": "Founder exit"},
            {"relevance_headline": 140, "assessment_headline": "Clamped"}
        ]);
        let scores = parse_batch_scores(value, 2).unwrap();
        assert_eq!(scores[0], (92, "Founder exit".to_string()));
        assert_eq!(scores[1].0, 100);
    }

    #[test]
    fn rejects_length_mismatch() {
        let value = json!([{"relevance_headline": 92, "assessment_headline": "x"}]);
        let err = parse_batch_scores(value, 3).unwrap_err();
        assert!(err.contains("length"));
    }

    #[test]
    fn rejects_non_array_and_partial_items() {
        assert!(parse_batch_scores(json!({"relevance_headline": 1}), 1).is_err());
        let value = json!([
            {"relevance_headline": 92, "assessment_headline": "ok"},
            {"score": 50}
        ]);
        assert!(parse_batch_scores(value, 2).is_err());
    }

    #[test]
    fn rejects_empty_rationale() {
        let value = json!([{"relevance_headline": 60, "assessment_headline": "  "}]);
        assert!(parse_batch_scores(value, 1).is_err());
    }
}
