use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;
use wealthsignal_common::{slugify, truncate_words, Article};

use crate::prompts;
use crate::traits::{IntelligenceRequest, IntelligenceService, IntelligenceTask};

const SUMMARY_CHARS: usize = 600;
const KEY_HEADLINE_WORDS: usize = 8;

/// Articles judged to describe one event.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub event_key: String,
    pub members: Vec<Article>,
}

impl Cluster {
    pub fn member_ids(&self) -> HashSet<Uuid> {
        self.members.iter().map(|a| a.id).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    event_key: String,
    article_ids: Vec<String>,
}

/// `event_key` for an article that ends up alone.
pub fn singleton_key(article: &Article, run_date: NaiveDate) -> String {
    with_date(&slugify(&truncate_words(&article.headline, KEY_HEADLINE_WORDS)), run_date)
}

fn with_date(slug: &str, run_date: NaiveDate) -> String {
    let date = run_date.format("%Y-%m-%d").to_string();
    let slug = slug.trim_matches('-');
    if slug.ends_with(&date) {
        slug.to_string()
    } else if slug.is_empty() {
        format!("event-{date}")
    } else {
        format!("{slug}-{date}")
    }
}

/// Group articles conservatively. A malformed response puts every article
/// in its own cluster; articles the response leaves out become singletons.
pub async fn group_articles(
    intelligence: &dyn IntelligenceService,
    articles: &[Article],
    run_date: NaiveDate,
) -> Vec<Cluster> {
    if articles.is_empty() {
        return Vec::new();
    }
    if articles.len() == 1 {
        return singletons(articles, run_date);
    }

    let input: Vec<Value> = articles
        .iter()
        .map(|a| {
            let summary = a
                .assessment_article
                .clone()
                .or_else(|| a.article_content.clone())
                .unwrap_or_default();
            json!({
                "id": a.id.to_string(),
                "headline": a.headline,
                "source": a.newspaper,
                "summary": ai_client::truncate_to_char_boundary(&summary, SUMMARY_CHARS),
            })
        })
        .collect();
    let user = format!(
        "Run date: {}\nArticles:\n{}",
        run_date.format("%Y-%m-%d"),
        Value::Array(input)
    );
    let request = IntelligenceRequest::new(
        IntelligenceTask::EventClustering,
        prompts::EVENT_CLUSTERING_SYSTEM,
        user,
    );

    let groups = match intelligence.complete_json(&request).await {
        Ok(value) => match serde_json::from_value::<Vec<RawGroup>>(value) {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "Clustering response malformed, using singletons");
                return singletons(articles, run_date);
            }
        },
        Err(e) => {
            warn!(error = %e, "Clustering call failed, using singletons");
            return singletons(articles, run_date);
        }
    };

    let clusters = assemble(groups, articles, run_date);
    info!(articles = articles.len(), clusters = clusters.len(), "Articles clustered");
    clusters
}

fn singletons(articles: &[Article], run_date: NaiveDate) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::with_capacity(articles.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for article in articles {
        push_member(&mut clusters, &mut index, singleton_key(article, run_date), article.clone());
    }
    clusters
}

fn push_member(clusters: &mut Vec<Cluster>, index: &mut HashMap<String, usize>, key: String, article: Article) {
    match index.get(&key) {
        Some(&i) => clusters[i].members.push(article),
        None => {
            index.insert(key.clone(), clusters.len());
            clusters.push(Cluster {
                event_key: key,
                members: vec![article],
            });
        }
    }
}

/// Unknown ids are ignored, an id claimed twice stays with its first group,
/// and groups sharing a key merge.
fn assemble(groups: Vec<RawGroup>, articles: &[Article], run_date: NaiveDate) -> Vec<Cluster> {
    let by_id: HashMap<String, &Article> = articles.iter().map(|a| (a.id.to_string(), a)).collect();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for group in groups {
        let members: Vec<&Article> = group
            .article_ids
            .iter()
            .filter_map(|id| by_id.get(id.trim()).copied())
            .filter(|a| assigned.insert(a.id.to_string()))
            .collect();
        let Some(first) = members.first() else {
            continue;
        };
        let key = match slugify(&group.event_key) {
            slug if slug.is_empty() => singleton_key(first, run_date),
            slug => with_date(&slug, run_date),
        };
        for member in members {
            push_member(&mut clusters, &mut index, key.clone(), member.clone());
        }
    }

    for article in articles {
        if !assigned.contains(&article.id.to_string()) {
            push_member(&mut clusters, &mut index, singleton_key(article, run_date), article.clone());
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stored_article, MockIntelligence};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn articles() -> Vec<Article> {
        vec![
            stored_article("https://borsen.dk/1", "Axcel køber Danske Rør af familien Holm", 80),
            stored_article("https://finans.dk/2", "Familien Holm sælger Danske Rør til Axcel", 85),
            stored_article("https://dn.no/3", "Rederi i Bergen børsnoteres til milliarder", 70),
        ]
    }

    #[tokio::test]
    async fn groups_members_and_fills_in_singletons() {
        let articles = articles();
        let ids: Vec<String> = articles.iter().map(|a| a.id.to_string()).collect();
        let (a, b) = (ids[0].clone(), ids[1].clone());
        let intelligence = MockIntelligence::new().on(IntelligenceTask::EventClustering, move |_| {
            Ok(json!([{"event_key": "Holm family sells Danske Rør", "article_ids": [a, b, "not-an-id"]}]))
        });

        let clusters = group_articles(&intelligence, &articles, date()).await;

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].event_key, "holm-family-sells-danske-rør-2025-03-14");
        assert_eq!(clusters[0].members.len(), 2);
        assert_eq!(clusters[1].members[0].link, "https://dn.no/3");
        assert!(clusters[1].event_key.ends_with("2025-03-14"));
    }

    #[tokio::test]
    async fn malformed_response_falls_back_to_singletons() {
        let intelligence =
            MockIntelligence::new().on(IntelligenceTask::EventClustering, |_| Ok(json!({"groups": []})));
        let clusters = group_articles(&intelligence, &articles(), date()).await;
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.members.len() == 1));
    }

    #[test]
    fn ids_claimed_twice_stay_with_first_group() {
        let articles = articles();
        let id = articles[0].id.to_string();
        let groups = vec![
            RawGroup {
                event_key: "first-2025-03-14".to_string(),
                article_ids: vec![id.clone()],
            },
            RawGroup {
                event_key: "second".to_string(),
                article_ids: vec![id],
            },
        ];
        let clusters = assemble(groups, &articles, date());
        assert_eq!(clusters[0].event_key, "first-2025-03-14");
        assert_eq!(clusters.iter().map(|c| c.members.len()).sum::<usize>(), 3);
    }
}
