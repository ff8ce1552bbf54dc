//! Every relevance and sizing threshold used by the pipeline, defined once.

/// Headline score at or above which enrichment is attempted.
pub const HEADLINE_RELEVANCE_FOR_ENRICHMENT: i32 = 50;
/// Headline score at or above which a failed fetch may be verified or salvaged.
pub const HIGH_SIGNAL_HEADLINE: i32 = 80;
/// Article score required for clustering and contact extraction.
pub const ARTICLE_RELEVANCE_FOR_EVENTS: i32 = 50;
/// Article score at or above which `article_content` is persisted.
pub const CONTENT_RETENTION_RELEVANCE: i32 = 50;
pub const MIN_HEADLINE_CHARS: usize = 20;
pub const JSON_LD_MIN_HEADLINES: usize = 3;
pub const MIN_ARTICLE_CONTENT_CHARS: usize = 300;
pub const ASSESSMENT_BATCH_SIZE: usize = 10;
/// Historical matches must be strictly more similar than this.
pub const RAG_SIMILARITY_THRESHOLD: f64 = 0.80;
pub const RAG_MAX_HISTORICAL: usize = 3;
pub const MAX_ENTITIES_PER_CLUSTER: usize = 3;
/// Minimum estimated wealth, in millions of dollars. Strictly exceeded.
pub const MIN_OPPORTUNITY_WEALTH_MM: f64 = 30.0;
pub const SUMMARY_MAX_WORDS: usize = 80;
pub const MAX_VERIFICATION_CANDIDATES: usize = 4;
pub const STORE_WRITE_ATTEMPTS: u32 = 3;
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Run-time view of the thresholds. Defaults to the constants above; tests
/// and operators can override individual values.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub headline_relevance_for_enrichment: i32,
    pub high_signal_headline: i32,
    pub article_relevance_for_events: i32,
    pub content_retention_relevance: i32,
    pub min_headline_chars: usize,
    pub json_ld_min_headlines: usize,
    pub min_article_content_chars: usize,
    pub assessment_batch_size: usize,
    pub rag_similarity_threshold: f64,
    pub rag_max_historical: usize,
    pub max_entities_per_cluster: usize,
    pub min_opportunity_wealth_mm: f64,
    pub summary_max_words: usize,
    pub max_verification_candidates: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            headline_relevance_for_enrichment: HEADLINE_RELEVANCE_FOR_ENRICHMENT,
            high_signal_headline: HIGH_SIGNAL_HEADLINE,
            article_relevance_for_events: ARTICLE_RELEVANCE_FOR_EVENTS,
            content_retention_relevance: CONTENT_RETENTION_RELEVANCE,
            min_headline_chars: MIN_HEADLINE_CHARS,
            json_ld_min_headlines: JSON_LD_MIN_HEADLINES,
            min_article_content_chars: MIN_ARTICLE_CONTENT_CHARS,
            assessment_batch_size: ASSESSMENT_BATCH_SIZE,
            rag_similarity_threshold: RAG_SIMILARITY_THRESHOLD,
            rag_max_historical: RAG_MAX_HISTORICAL,
            max_entities_per_cluster: MAX_ENTITIES_PER_CLUSTER,
            min_opportunity_wealth_mm: MIN_OPPORTUNITY_WEALTH_MM,
            summary_max_words: SUMMARY_MAX_WORDS,
            max_verification_candidates: MAX_VERIFICATION_CANDIDATES,
        }
    }
}
