use std::collections::HashMap;

use wealthsignal_common::SourceConfig;

/// Source lookup for one run, keyed by newspaper name.
///
/// Built from the sources loaded at the start of the run and dropped with
/// the run. Articles carry the newspaper name, so that is the lookup key.
#[derive(Debug, Default, Clone)]
pub struct SourceCache {
    by_name: HashMap<String, SourceConfig>,
}

impl SourceCache {
    pub fn new(sources: &[SourceConfig]) -> Self {
        let by_name = sources
            .iter()
            .map(|s| (s.name.to_lowercase(), s.clone()))
            .collect();
        Self { by_name }
    }

    pub fn get(&self, newspaper: &str) -> Option<&SourceConfig> {
        self.by_name.get(&newspaper.to_lowercase())
    }

    /// Configured article-body selectors for a newspaper, or none.
    pub fn article_selectors(&self, newspaper: &str) -> &[String] {
        self.get(newspaper)
            .map(|s| s.article_selectors.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::source_config;

    #[test]
    fn lookup_is_case_insensitive_by_newspaper() {
        let mut source = source_config("borsen", "Børsen", "https://borsen.dk", "Denmark");
        source.article_selectors = vec!["div.article-body".to_string()];
        let cache = SourceCache::new(&[source]);
        assert_eq!(cache.article_selectors("BØRSEN"), ["div.article-body".to_string()]);
        assert!(cache.article_selectors("Unknown").is_empty());
    }
}
