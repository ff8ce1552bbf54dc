use serde::Serialize;

/// Outcome of scraping one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub key: String,
    pub name: String,
    pub headlines: u32,
    pub success: bool,
    pub error: Option<String>,
}

/// Stats from a pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub source_health: Vec<SourceHealth>,
    pub headlines_scraped: u32,
    pub cross_source_duplicates: u32,
    pub fresh_articles: u32,
    pub refreshed_articles: u32,
    pub assessment_batches: u32,
    pub assessment_batches_failed: u32,
    pub relevant_headlines: u32,
    pub enriched_direct: u32,
    pub enriched_verified: u32,
    pub enriched_salvaged: u32,
    pub enrichment_dropped: u32,
    pub enrichment_failed: u32,
    pub opportunities_found: u32,
    pub contacts_rejected: u32,
    pub clusters: u32,
    pub events_synthesized: u32,
    pub articles_committed: u32,
    pub events_committed: u32,
    pub opportunities_committed: u32,
    pub notifications_sent: u32,
    pub notifications_skipped: u32,
    pub notifications_failed: u32,
}

impl RunStats {
    pub fn sources_succeeded(&self) -> usize {
        self.source_health.iter().filter(|s| s.success).count()
    }

    pub fn enriched_total(&self) -> u32 {
        self.enriched_direct + self.enriched_verified + self.enriched_salvaged
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== WealthSignal Run Complete ===")?;
        writeln!(
            f,
            "Sources:            {}/{} succeeded",
            self.sources_succeeded(),
            self.source_health.len()
        )?;
        writeln!(f, "Headlines scraped:  {}", self.headlines_scraped)?;
        writeln!(f, "Cross-source dupes: {}", self.cross_source_duplicates)?;
        writeln!(f, "Fresh articles:     {}", self.fresh_articles)?;
        writeln!(f, "Refreshed:          {}", self.refreshed_articles)?;
        writeln!(
            f,
            "Assessment batches: {} ({} defaulted)",
            self.assessment_batches, self.assessment_batches_failed
        )?;
        writeln!(f, "Relevant headlines: {}", self.relevant_headlines)?;
        writeln!(f, "\nEnrichment:")?;
        writeln!(f, "  Direct:   {}", self.enriched_direct)?;
        writeln!(f, "  Verified: {}", self.enriched_verified)?;
        writeln!(f, "  Salvaged: {}", self.enriched_salvaged)?;
        writeln!(f, "  Dropped:  {}", self.enrichment_dropped)?;
        writeln!(f, "  Failed:   {}", self.enrichment_failed)?;
        writeln!(f, "\nOpportunities found: {} ({} rejected)", self.opportunities_found, self.contacts_rejected)?;
        writeln!(f, "Clusters:            {}", self.clusters)?;
        writeln!(f, "Events synthesized:  {}", self.events_synthesized)?;
        writeln!(f, "\nCommitted:")?;
        writeln!(f, "  Articles:      {}", self.articles_committed)?;
        writeln!(f, "  Events:        {}", self.events_committed)?;
        writeln!(f, "  Opportunities: {}", self.opportunities_committed)?;
        writeln!(
            f,
            "\nNotifications: {} sent, {} skipped, {} failed",
            self.notifications_sent, self.notifications_skipped, self.notifications_failed
        )?;
        let failing: Vec<_> = self.source_health.iter().filter(|s| !s.success).collect();
        if !failing.is_empty() {
            writeln!(f, "\nUnhealthy sources:")?;
            for s in failing {
                writeln!(f, "  {}: {}", s.name, s.error.as_deref().unwrap_or("no headlines"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(name: &str, headlines: u32, error: Option<&str>) -> SourceHealth {
        SourceHealth {
            key: name.to_lowercase(),
            name: name.to_string(),
            headlines,
            success: headlines > 0,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn enriched_total_sums_every_method() {
        let stats = RunStats {
            enriched_direct: 3,
            enriched_verified: 2,
            enriched_salvaged: 1,
            enrichment_dropped: 4,
            ..Default::default()
        };
        assert_eq!(stats.enriched_total(), 6);
    }

    #[test]
    fn summary_lists_unhealthy_sources() {
        let stats = RunStats {
            source_health: vec![
                health("Borsen", 12, None),
                health("Finans", 0, Some("render failed")),
                health("Kapital", 0, None),
            ],
            ..Default::default()
        };
        assert_eq!(stats.sources_succeeded(), 1);

        let summary = stats.to_string();
        assert!(summary.contains("1/3 succeeded"));
        assert!(summary.contains("Finans: render failed"));
        assert!(summary.contains("Kapital: no headlines"));
        assert!(!summary.contains("Borsen:"));
    }

    #[test]
    fn healthy_run_has_no_unhealthy_section() {
        let stats = RunStats {
            source_health: vec![health("Borsen", 4, None)],
            ..Default::default()
        };
        assert!(!stats.to_string().contains("Unhealthy sources"));
    }
}
