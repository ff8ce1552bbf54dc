use serde::Deserialize;
use tracing::warn;
use wealthsignal_common::{Article, KeyIndividual};

use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask};

pub const SALVAGE_MARKER: &str = "[Synthesized from headline only; article body unavailable]";

#[derive(Debug, Clone, Deserialize)]
pub struct SalvagedContent {
    #[serde(default)]
    pub headline: String,
    pub summary: String,
    #[serde(default)]
    pub key_individuals: Vec<KeyIndividual>,
}

/// Ask for a brief built from the headline alone. `None` on any service
/// error or unusable response.
pub async fn salvage(intelligence: &dyn IntelligenceService, article: &Article) -> Option<SalvagedContent> {
    let user = format!(
        "Headline: {}\nNewspaper: {}\nCountry: {}\nArticle body: NOT AVAILABLE",
        article.headline, article.newspaper, article.country
    );
    let request = IntelligenceRequest::new(IntelligenceTask::Salvage, prompts::SALVAGE_SYSTEM, user);

    let value = match intelligence.complete_json(&request).await {
        Ok(v) => v,
        Err(e) => {
            warn!(link = article.link.as_str(), error = %e, "Salvage call failed");
            return None;
        }
    };
    match serde_json::from_value::<SalvagedContent>(value) {
        Ok(content) if !content.summary.trim().is_empty() => Some(content),
        Ok(_) => {
            warn!(link = article.link.as_str(), "Salvage returned an empty summary");
            None
        }
        Err(e) => {
            warn!(link = article.link.as_str(), error = %e, "Salvage response malformed");
            None
        }
    }
}

/// Promote an article with salvaged content so it can take part in clustering.
pub fn apply_salvage(article: &mut Article, content: SalvagedContent) {
    article.article_content = Some(format!("{SALVAGE_MARKER}\n\n{}", content.summary.trim()));
    article.relevance_article = Some(article.relevance_headline);
    let headline_note = if content.headline.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", content.headline.trim())
    };
    article.assessment_article = Some(format!(
        "Salvaged from headline only{headline_note}; headline score carried over."
    ));
    article.key_individuals = content
        .key_individuals
        .into_iter()
        .filter(|k| !k.name.trim().is_empty())
        .collect();
}
