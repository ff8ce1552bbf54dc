//! Full-text enrichment for relevant headlines.
//!
//! Each article walks the [`state`] machine: direct fetch, then verification
//! at alternate outlets, then salvage from the headline. The driver here
//! performs the I/O for the current state and feeds the resulting event to
//! the pure transition function.

pub mod content;
pub mod salvage;
pub mod state;
pub mod verification;

use chrono::Utc;
use tracing::{debug, info};
use wealthsignal_common::{Article, EnrichmentMethod, Thresholds};

use crate::assessment::assess_article;
use crate::pipeline::source_cache::SourceCache;
use crate::traits::{IntelligenceService, PageFetcher, WebSearcher};

pub use state::{transition, EnrichmentEvent, EnrichmentState};

#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    pub article: Article,
    pub final_state: EnrichmentState,
    /// Every state visited, starting with `Start`.
    pub path: Vec<EnrichmentState>,
}

impl EnrichmentResult {
    pub fn is_enriched(&self) -> bool {
        self.final_state == EnrichmentState::Done
    }

    pub fn method(&self) -> Option<EnrichmentMethod> {
        self.article.enrichment_method
    }
}

pub struct Enricher<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub searcher: &'a dyn WebSearcher,
    pub intelligence: &'a dyn IntelligenceService,
    pub sources: &'a SourceCache,
    pub thresholds: &'a Thresholds,
}

impl Enricher<'_> {
    pub async fn enrich(&self, mut article: Article) -> EnrichmentResult {
        let score = article.relevance_headline;
        let high_signal = self.thresholds.high_signal_headline;
        let mut state = EnrichmentState::Start;
        let mut path = vec![state];
        let mut method: Option<EnrichmentMethod> = None;

        while !state.is_terminal() {
            let event = match state {
                EnrichmentState::Start => match self.fetch_direct(&article).await {
                    Some(text) => {
                        article.article_content = Some(text);
                        method = Some(EnrichmentMethod::Direct);
                        EnrichmentEvent::ContentExtracted
                    }
                    None => EnrichmentEvent::FetchFailed,
                },
                EnrichmentState::Verifying => match verification::verify(
                    self.fetcher,
                    self.searcher,
                    &article,
                    self.thresholds.max_verification_candidates,
                    self.thresholds.min_article_content_chars,
                )
                .await
                {
                    Some((alternate, text)) => {
                        article.article_content = Some(text);
                        article.enriched_from = Some(alternate);
                        method = Some(EnrichmentMethod::Verified);
                        EnrichmentEvent::VerificationSucceeded
                    }
                    None => EnrichmentEvent::VerificationExhausted,
                },
                EnrichmentState::Salvaging => {
                    match salvage::salvage(self.intelligence, &article).await {
                        Some(content) => {
                            salvage::apply_salvage(&mut article, content);
                            method = Some(EnrichmentMethod::Salvaged);
                            EnrichmentEvent::SalvageSucceeded
                        }
                        None => EnrichmentEvent::SalvageFailed,
                    }
                }
                EnrichmentState::Fetched => {
                    assess_article(self.intelligence, &mut article).await;
                    EnrichmentEvent::Assessed
                }
                EnrichmentState::Done | EnrichmentState::Dropped => break,
            };

            let next = transition(state, event, score, high_signal);
            debug!(link = article.link.as_str(), from = ?state, event = ?event, to = ?next, "Enrichment transition");
            state = next;
            path.push(state);
        }

        if state == EnrichmentState::Done {
            article.enrichment_method = method;
            article.updated_at = Utc::now();
            info!(
                link = article.link.as_str(),
                method = ?method,
                relevance_article = ?article.relevance_article,
                "Article enriched"
            );
        } else {
            info!(
                link = article.link.as_str(),
                headline = article.headline.as_str(),
                relevance_headline = score,
                "Article dropped from enrichment"
            );
        }

        EnrichmentResult {
            article,
            final_state: state,
            path,
        }
    }

    async fn fetch_direct(&self, article: &Article) -> Option<String> {
        let html = self.fetcher.fetch(&article.link).await?;
        content::extract_article_text(
            &html,
            &article.link,
            self.sources.article_selectors(&article.newspaper),
            self.thresholds.min_article_content_chars,
        )
    }
}
