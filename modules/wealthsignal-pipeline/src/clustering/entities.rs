use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts;
use crate::traits::{Encyclopedia, IntelligenceRequest, IntelligenceService, IntelligenceTask};

const TITLES_PER_ENTITY: usize = 3;
const MAX_ENTITY_TEXT: usize = 8_000;

/// Descriptions that mark a page as something other than a business,
/// financier or deal.
const OFF_TOPIC_TERMS: &[&str] = &[
    "film",
    "movie",
    "television",
    "tv series",
    "sitcom",
    "novel",
    "fiction",
    "fictional",
    "character",
    "album",
    "song",
    "band",
    "singer",
    "rapper",
    "actor",
    "actress",
    "fashion model",
    "footballer",
    "video game",
    "magazine",
    "newspaper",
    "podcast",
];

/// Encyclopedic background for one entity named in a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityContext {
    pub entity: String,
    pub title: String,
    pub description: Option<String>,
    pub extract: String,
}

/// The resolved page must share at least one meaningful word with the query.
/// Names with no word of three or more characters ("BP", "H&M") must match
/// the whole title instead.
pub fn shares_a_word(query: &str, title: &str) -> bool {
    let words = |s: &str| -> HashSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 3)
            .map(|w| w.to_lowercase())
            .collect()
    };
    let query_words = words(query);
    if query_words.is_empty() {
        let compact = |s: &str| -> String {
            s.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect()
        };
        let query = compact(query);
        return !query.is_empty() && query == compact(title);
    }
    !query_words.is_disjoint(&words(title))
}

pub fn is_off_topic(description: &str) -> bool {
    let description = description.to_lowercase();
    OFF_TOPIC_TERMS
        .iter()
        .any(|term| contains_word_sequence(&description, term))
}

fn contains_word_sequence(haystack: &str, needle: &str) -> bool {
    let words: Vec<&str> = haystack.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    let target: Vec<&str> = needle.split_whitespace().collect();
    words.windows(target.len()).any(|w| w == target.as_slice())
}

/// High-value entities named in `text`, at most `max`.
pub async fn extract_entities(intelligence: &dyn IntelligenceService, text: &str, max: usize) -> Vec<String> {
    if max == 0 {
        return Vec::new();
    }
    let user = format!(
        "Maximum entities: {max}\n\nText:\n{}",
        ai_client::truncate_to_char_boundary(text, MAX_ENTITY_TEXT)
    );
    let request = IntelligenceRequest::new(
        IntelligenceTask::EntityExtraction,
        prompts::ENTITY_EXTRACTION_SYSTEM,
        user,
    );
    let value = match intelligence.complete_json(&request).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Entity extraction failed");
            return Vec::new();
        }
    };
    let Value::Array(items) = value else {
        warn!("Entity extraction response was not an array");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(max)
        .collect()
}

/// Resolve one entity to an encyclopedia page, skipping titles that drift
/// away from the query and pages that describe media or fiction.
pub async fn resolve_entity(encyclopedia: &dyn Encyclopedia, entity: &str) -> Option<EntityContext> {
    let titles = match encyclopedia.search_titles(entity, TITLES_PER_ENTITY).await {
        Ok(t) => t,
        Err(e) => {
            warn!(entity, error = %e, "Encyclopedia search failed");
            return None;
        }
    };

    for title in titles {
        if !shares_a_word(entity, &title) {
            debug!(entity, title = title.as_str(), "Rejected drifting title");
            continue;
        }
        let page = match encyclopedia.page_summary(&title).await {
            Ok(Some(page)) => page,
            Ok(None) => continue,
            Err(e) => {
                warn!(entity, title = title.as_str(), error = %e, "Encyclopedia summary failed");
                continue;
            }
        };
        let descriptor = page
            .description
            .clone()
            .unwrap_or_else(|| page.extract.split(". ").next().unwrap_or_default().to_string());
        if is_off_topic(&descriptor) {
            debug!(entity, title = page.title.as_str(), descriptor = descriptor.as_str(), "Rejected off-topic page");
            continue;
        }
        return Some(EntityContext {
            entity: entity.to_string(),
            title: page.title,
            description: page.description,
            extract: page.extract,
        });
    }
    None
}

/// Background for the entities in a cluster's combined text.
pub async fn entity_context(
    intelligence: &dyn IntelligenceService,
    encyclopedia: &dyn Encyclopedia,
    text: &str,
    max_entities: usize,
) -> Vec<EntityContext> {
    let mut contexts = Vec::new();
    for entity in extract_entities(intelligence, text, max_entities).await {
        if let Some(ctx) = resolve_entity(encyclopedia, &entity).await {
            contexts.push(ctx);
        }
    }
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEncyclopedia, MockIntelligence};
    use serde_json::json;
    use crate::traits::IntelligenceTask;

    #[test]
    fn drift_check_needs_a_shared_word() {
        assert!(shares_a_word("Danske Rør A/S", "Danske Rør"));
        assert!(!shares_a_word("Axcel", "Axolotl"));
        assert!(!shares_a_word("A/S", "A/S Holding"));
    }

    #[test]
    fn short_names_match_the_whole_title() {
        assert!(shares_a_word("BP", "BP"));
        assert!(shares_a_word("H&M", "H&M"));
        assert!(shares_a_word("h & m", "H&M"));
        assert!(!shares_a_word("BP", "BPX Energy"));
        assert!(!shares_a_word("&", "&"));
    }

    #[test]
    fn media_and_fiction_are_off_topic() {
        assert!(is_off_topic("2004 Danish film"));
        assert!(is_off_topic("Fictional character in Borgen"));
        assert!(is_off_topic("Norwegian pop singer"));
        assert!(!is_off_topic("Danish private equity firm"));
        assert!(!is_off_topic("Bandag tyre retreading company"));
    }

    #[tokio::test]
    async fn resolves_first_corporate_page() {
        let encyclopedia = MockEncyclopedia::new()
            .with_titles("Maersk", &["Maersk (film)", "Maersk"])
            .with_page("Maersk (film)", Some("1999 Danish film"), "A film.")
            .with_page("Maersk", Some("Danish shipping company"), "A.P. Møller - Mærsk A/S is a shipping company.");

        let ctx = resolve_entity(&encyclopedia, "Maersk").await.unwrap();
        assert_eq!(ctx.title, "Maersk");
        assert_eq!(ctx.description.as_deref(), Some("Danish shipping company"));
    }

    #[tokio::test]
    async fn two_letter_company_resolves_to_its_own_page() {
        let encyclopedia = MockEncyclopedia::new()
            .with_titles("BP", &["BPX Energy", "BP"])
            .with_page("BPX Energy", Some("American oil company"), "BPX Energy is a subsidiary.")
            .with_page("BP", Some("British multinational oil and gas company"), "BP p.l.c. is an oil company.");

        let ctx = resolve_entity(&encyclopedia, "BP").await.unwrap();
        assert_eq!(ctx.title, "BP");
    }

    #[tokio::test]
    async fn entity_list_is_capped_and_deduplicated() {
        let intelligence = MockIntelligence::new().on(IntelligenceTask::EntityExtraction, |_| {
            Ok(json!(["Axcel", "axcel", "Danske Rør", "Jens Holm", "Nordea"]))
        });
        let entities = extract_entities(&intelligence, "text", 3).await;
        assert_eq!(entities, vec!["Axcel", "Danske Rør", "Jens Holm"]);
    }
}
