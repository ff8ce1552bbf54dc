//! Headline extraction from rendered listing pages.
//!
//! JSON-LD first; when the page carries too few structured headlines the
//! source's [`ExtractionStrategy`] runs instead. Either way links are made
//! absolute, short texts are discarded and duplicate links collapse with the
//! last occurrence winning.

pub mod json_ld;
pub mod strategies;

use std::collections::HashMap;

use scraper::Html;
use tracing::{debug, info, warn};
use wealthsignal_common::{collapse_whitespace, resolve_link, CandidateHeadline, SourceConfig, Thresholds};

use crate::traits::PageFetcher;

pub use strategies::ExtractionStrategy;

/// Candidate headlines from one rendered listing page.
pub fn extract(source: &SourceConfig, html: &str, thresholds: &Thresholds) -> Vec<CandidateHeadline> {
    let document = Html::parse_document(html);

    let structured = json_ld::extract_json_ld(&document);
    let structured = normalize(source, structured, thresholds);
    if structured.len() >= thresholds.json_ld_min_headlines {
        debug!(source = source.key.as_str(), count = structured.len(), "Using JSON-LD headlines");
        return structured;
    }

    let strategy = ExtractionStrategy::for_source(source);
    debug!(source = source.key.as_str(), strategy = ?strategy, "Falling back to extraction strategy");
    normalize(source, strategy.apply(&document), thresholds)
}

fn normalize(
    source: &SourceConfig,
    raw: Vec<(String, String)>,
    thresholds: &Thresholds,
) -> Vec<CandidateHeadline> {
    let base = if source.base_url.is_empty() {
        source.start_url.as_str()
    } else {
        source.base_url.as_str()
    };

    let mut out: Vec<CandidateHeadline> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (text, href) in raw {
        let headline = collapse_whitespace(&text);
        if headline.chars().count() < thresholds.min_headline_chars {
            continue;
        }
        let Some(link) = resolve_link(base, &href) else {
            continue;
        };
        let candidate = CandidateHeadline {
            headline,
            link: link.clone(),
            newspaper: source.name.clone(),
            country: source.country.clone(),
        };
        match index.get(&link) {
            Some(&i) => out[i] = candidate,
            None => {
                index.insert(link, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

/// Result of scraping one source's listing page.
#[derive(Debug, Clone)]
pub struct SourceScrape {
    pub source_key: String,
    pub source_name: String,
    pub headlines: Vec<CandidateHeadline>,
    /// Why the source produced nothing, if it didn't.
    pub error: Option<String>,
}

impl SourceScrape {
    /// A source counts as healthy only if it produced headlines.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && !self.headlines.is_empty()
    }
}

/// Fetch a source's listing page and extract its headlines. Never fails:
/// render problems come back as an empty scrape with an error message.
pub async fn scrape_source(
    fetcher: &dyn PageFetcher,
    source: &SourceConfig,
    thresholds: &Thresholds,
) -> SourceScrape {
    let mut scrape = SourceScrape {
        source_key: source.key.clone(),
        source_name: source.name.clone(),
        headlines: Vec::new(),
        error: None,
    };

    let url = if source.start_url.is_empty() {
        &source.base_url
    } else {
        &source.start_url
    };

    match fetcher.fetch(url).await {
        Some(html) if !html.trim().is_empty() => {
            scrape.headlines = extract(source, &html, thresholds);
            if scrape.headlines.is_empty() {
                scrape.error = Some("no extractable headlines".to_string());
                warn!(source = source.key.as_str(), url = url.as_str(), "No headlines extracted");
            } else {
                info!(source = source.key.as_str(), count = scrape.headlines.len(), "Extracted headlines");
            }
        }
        _ => {
            scrape.error = Some("page could not be rendered".to_string());
            warn!(source = source.key.as_str(), url = url.as_str(), "Failed to render listing page");
        }
    }
    scrape
}

/// Collapse duplicate links across sources. The last occurrence wins but
/// keeps the first occurrence's position. Returns the number collapsed.
pub fn dedupe_across_sources(candidates: Vec<CandidateHeadline>) -> (Vec<CandidateHeadline>, usize) {
    let total = candidates.len();
    let mut out: Vec<CandidateHeadline> = Vec::with_capacity(total);
    let mut index: HashMap<String, usize> = HashMap::new();
    for candidate in candidates {
        match index.get(&candidate.link) {
            Some(&i) => out[i] = candidate,
            None => {
                index.insert(candidate.link.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    let collapsed = total - out.len();
    (out, collapsed)
}
