use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use wealthsignal_common::Article;

use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask};

const MAX_CONTACT_CONTENT: usize = 10_000;

/// One person the intelligence service thinks is worth contacting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContactCandidate {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub based_in: Option<String>,
    #[serde(default)]
    pub why_contact: String,
    #[serde(default)]
    pub likely_mm_dollar_wealth: f64,
    #[serde(default)]
    pub email_suggestion: Option<String>,
}

/// Candidate contacts for one enriched article. Items that fail to parse are
/// skipped; a failed call yields no candidates.
pub async fn extract_candidates(
    intelligence: &dyn IntelligenceService,
    article: &Article,
) -> Vec<ContactCandidate> {
    let content = article.article_content.as_deref().unwrap_or_default();
    let user = format!(
        "Headline: {}\nNewspaper: {}\nCountry: {}\nAssessment: {}\nArticle: {}",
        article.headline,
        article.newspaper,
        article.country,
        article.assessment_article.as_deref().unwrap_or_default(),
        ai_client::truncate_to_char_boundary(content, MAX_CONTACT_CONTENT),
    );
    let request = IntelligenceRequest::new(
        IntelligenceTask::ContactExtraction,
        prompts::CONTACT_EXTRACTION_SYSTEM,
        user,
    )
    .with_examples(prompts::CONTACT_EXTRACTION_EXAMPLES);

    let value = match intelligence.complete_json(&request).await {
        Ok(v) => v,
        Err(e) => {
            warn!(link = article.link.as_str(), error = %e, "Contact extraction failed");
            return Vec::new();
        }
    };
    parse_candidates(value, &article.link)
}

fn parse_candidates(value: Value, link: &str) -> Vec<ContactCandidate> {
    let Value::Array(items) = value else {
        warn!(link, "Contact extraction response was not an array");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ContactCandidate>(item) {
            Ok(c) if !c.name.trim().is_empty() => Some(c),
            Ok(_) => None,
            Err(e) => {
                debug!(link, error = %e, "Skipping malformed contact");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_items_are_skipped() {
        let value = json!([
            {"name": "Jens Holm", "role": "Owner", "likely_mm_dollar_wealth": 120, "why_contact": "Sold company"},
            {"role": "no name"},
            {"name": "  "},
            {"name": "Mette Holm", "likely_mm_dollar_wealth": "lots"}
        ]);
        let parsed = parse_candidates(value, "https://x");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Jens Holm");
        assert_eq!(parsed[0].likely_mm_dollar_wealth, 120.0);
    }

    #[test]
    fn non_array_yields_nothing() {
        assert!(parse_candidates(json!({"name": "x"}), "https://x").is_empty());
    }
}
