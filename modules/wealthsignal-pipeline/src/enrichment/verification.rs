use std::collections::HashSet;

use tracing::{debug, info, warn};
use wealthsignal_common::{host_of, Article};

use super::content::extract_article_text;
use crate::traits::{PageFetcher, SearchError, SearchHit, WebSearcher};

/// Hosts that never carry the article itself.
const EXCLUDED_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
    "reddit.com",
    "pinterest.com",
    "wikipedia.org",
    "google.com",
    "news.google.com",
    "msn.com",
    "yahoo.com",
];

fn is_excluded(host: &str) -> bool {
    EXCLUDED_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

/// Alternate-outlet links worth trying, in search order. Drops the original
/// outlet, known non-article hosts and repeats.
pub fn alternate_links(hits: &[SearchHit], original_link: &str, max: usize) -> Vec<String> {
    let original_host = host_of(original_link);
    let mut seen = HashSet::new();
    hits.iter()
        .filter_map(|hit| {
            let host = host_of(&hit.link)?;
            if is_excluded(&host) || Some(&host) == original_host.as_ref() {
                return None;
            }
            seen.insert(hit.link.clone()).then(|| hit.link.clone())
        })
        .take(max)
        .collect()
}

/// Look for the same story at another outlet. Returns the alternate link
/// and its extracted body for the first candidate that yields enough text.
pub async fn verify(
    fetcher: &dyn PageFetcher,
    searcher: &dyn WebSearcher,
    article: &Article,
    max_candidates: usize,
    min_chars: usize,
) -> Option<(String, String)> {
    let query = article.headline.clone();
    let hits = match searcher.search(&query, max_candidates * 3).await {
        Ok(hits) => hits,
        Err(SearchError::Unavailable) => {
            debug!(link = article.link.as_str(), "Search unavailable, verification skipped");
            return None;
        }
        Err(e) => {
            warn!(link = article.link.as_str(), error = %e, "Verification search failed");
            return None;
        }
    };

    for alternate in alternate_links(&hits, &article.link, max_candidates) {
        let Some(html) = fetcher.fetch(&alternate).await else {
            debug!(alternate = alternate.as_str(), "Alternate outlet failed to render");
            continue;
        };
        if let Some(text) = extract_article_text(&html, &alternate, &[], min_chars) {
            info!(
                link = article.link.as_str(),
                alternate = alternate.as_str(),
                "Verified story at alternate outlet"
            );
            return Some((alternate, text));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(link: &str) -> SearchHit {
        SearchHit {
            title: "t".to_string(),
            link: link.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn excludes_original_outlet_and_social_hosts() {
        let hits = vec![
            hit("https://www.borsen.dk/a/1"),
            hit("https://m.facebook.com/post/1"),
            hit("https://finans.dk/story"),
            hit("https://en.wikipedia.org/wiki/X"),
            hit("https://finans.dk/story"),
            hit("https://e24.no/story"),
        ];
        let links = alternate_links(&hits, "https://borsen.dk/a/1", 4);
        assert_eq!(links, vec!["https://finans.dk/story", "https://e24.no/story"]);
    }

    #[test]
    fn respects_candidate_cap() {
        let hits: Vec<SearchHit> = (0..10)
            .map(|i| hit(&format!("https://outlet{i}.com/story")))
            .collect();
        assert_eq!(alternate_links(&hits, "https://borsen.dk/a/1", 4).len(), 4);
    }
}
