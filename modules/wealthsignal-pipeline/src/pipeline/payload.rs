use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use wealthsignal_common::{Article, Opportunity, SynthesizedEvent};

use super::stats::RunStats;

/// Everything one run accumulates between stages. Owned by the driver and
/// only mutated between concurrent sections.
#[derive(Debug, Clone)]
pub struct RunPayload {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stats: RunStats,
    /// Fresh skeletal (or refreshed) articles entering the pipeline.
    pub articles_for_pipeline: Vec<Article>,
    /// Every article after headline assessment.
    pub assessed_candidates: Vec<Article>,
    pub enriched_articles: Vec<Article>,
    pub full_article_map: HashMap<Uuid, Article>,
    pub synthesized_events_to_save: Vec<SynthesizedEvent>,
    pub opportunities_to_save: Vec<Opportunity>,
}

impl RunPayload {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            stats: RunStats::default(),
            articles_for_pipeline: Vec::new(),
            assessed_candidates: Vec::new(),
            enriched_articles: Vec::new(),
            full_article_map: HashMap::new(),
            synthesized_events_to_save: Vec::new(),
            opportunities_to_save: Vec::new(),
        }
    }

    /// Assessed articles with enriched versions swapped in, in assessment order.
    pub fn articles_to_commit(&self) -> Vec<Article> {
        self.assessed_candidates
            .iter()
            .map(|a| self.full_article_map.get(&a.id).cloned().unwrap_or_else(|| a.clone()))
            .collect()
    }
}

/// What a stage hands back: the payload and whether later stages should run.
#[derive(Debug)]
pub struct StageOutcome {
    pub payload: RunPayload,
    pub proceed: bool,
}

impl StageOutcome {
    pub fn proceed(payload: RunPayload) -> Self {
        Self { payload, proceed: true }
    }

    pub fn stop(payload: RunPayload) -> Self {
        Self { payload, proceed: false }
    }
}
