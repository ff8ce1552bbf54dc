use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use wealthsignal_common::{collapse_whitespace, SourceConfig};

/// Per-source headline extraction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Every `a[href]` whose visible text looks like a headline.
    AnchorText,
    /// Configured CSS selector for headline elements, with an optional link
    /// selector relative to each headline.
    Selector {
        headline: String,
        link: Option<String>,
    },
    /// Teaser/card containers holding a heading and a link.
    TeaserCards,
}

/// Sources whose front pages are built from teaser cards.
fn registered(key: &str) -> Option<ExtractionStrategy> {
    match key.to_ascii_lowercase().as_str() {
        "borsen" | "finans" | "dn" | "e24" | "di" | "kauppalehti" => {
            Some(ExtractionStrategy::TeaserCards)
        }
        _ => None,
    }
}

impl ExtractionStrategy {
    /// Strategy for a source: explicit `strategy` field first, then the
    /// registry entry for the source key, then a configured headline
    /// selector, else anchor text.
    pub fn for_source(source: &SourceConfig) -> Self {
        if let Some(name) = source.strategy.as_deref() {
            match name.trim().to_ascii_lowercase().as_str() {
                "teaser_cards" => return ExtractionStrategy::TeaserCards,
                "anchor_text" => return ExtractionStrategy::AnchorText,
                "selector" => {}
                other => {
                    warn!(source = source.key.as_str(), strategy = other, "Unknown extraction strategy, using anchor text");
                    return ExtractionStrategy::AnchorText;
                }
            }
        } else if let Some(strategy) = registered(&source.key) {
            return strategy;
        }

        match &source.headline_selector {
            Some(headline) => ExtractionStrategy::Selector {
                headline: headline.clone(),
                link: source.link_selector.clone(),
            },
            None => ExtractionStrategy::AnchorText,
        }
    }

    /// `(visible text, href)` pairs in document order. Links are not yet resolved.
    pub fn apply(&self, document: &Html) -> Vec<(String, String)> {
        match self {
            ExtractionStrategy::AnchorText => anchor_text(document),
            ExtractionStrategy::Selector { headline, link } => {
                selector(document, headline, link.as_deref())
            }
            ExtractionStrategy::TeaserCards => teaser_cards(document),
        }
    }
}

fn parse(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(selector = css, error = %e, "Invalid CSS selector");
            None
        }
    }
}

fn visible_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn anchor_text(document: &Html) -> Vec<(String, String)> {
    let Some(anchors) = parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some((visible_text(&a), href.to_string()))
        })
        .collect()
}

fn selector(document: &Html, headline_css: &str, link_css: Option<&str>) -> Vec<(String, String)> {
    let Some(headline_sel) = parse(headline_css) else {
        return Vec::new();
    };
    let link_sel = link_css.and_then(parse);
    let Some(any_anchor) = parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&headline_sel)
        .filter_map(|el| {
            let href = match &link_sel {
                Some(sel) => el
                    .select(sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
                None => link_for(&el, &any_anchor),
            }?;
            Some((visible_text(&el), href))
        })
        .collect()
}

fn teaser_cards(document: &Html) -> Vec<(String, String)> {
    let (Some(cards), Some(heading), Some(any_anchor)) = (
        parse(r#"article, [class*="teaser"], [class*="card"]"#),
        parse("h1, h2, h3, h4"),
        parse("a[href]"),
    ) else {
        return Vec::new();
    };

    document
        .select(&cards)
        .filter_map(|card| {
            let title = card.select(&heading).next()?;
            let href = link_for(&title, &any_anchor).or_else(|| {
                card.select(&any_anchor)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
            })?;
            Some((visible_text(&title), href))
        })
        .collect()
}

/// The element's own href, a descendant anchor, or the nearest enclosing anchor.
fn link_for(element: &ElementRef, any_anchor: &Selector) -> Option<String> {
    if element.value().name() == "a" {
        return element.value().attr("href").map(str::to_string);
    }
    if let Some(href) = element
        .select(any_anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        return Some(href.to_string());
    }
    let mut current = element.parent();
    while let Some(node) = current {
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == "a" {
                return el.value().attr("href").map(str::to_string);
            }
        }
        current = node.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wealthsignal_common::SourceStatus;

    fn source(key: &str) -> SourceConfig {
        SourceConfig {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: key.to_string(),
            base_url: "https://example.com".to_string(),
            start_url: "https://example.com".to_string(),
            country: "Denmark".to_string(),
            status: SourceStatus::Active,
            strategy: None,
            headline_selector: None,
            link_selector: None,
            article_selectors: vec![],
            last_scraped_at: None,
            last_success_at: None,
            consecutive_failures: 0,
        }
    }

    #[test]
    fn dispatch_uses_registry_then_selector_then_default() {
        assert_eq!(
            ExtractionStrategy::for_source(&source("borsen")),
            ExtractionStrategy::TeaserCards
        );
        assert_eq!(
            ExtractionStrategy::for_source(&source("unknown-outlet")),
            ExtractionStrategy::AnchorText
        );

        let mut configured = source("unknown-outlet");
        configured.headline_selector = Some("h3.title".to_string());
        assert_eq!(
            ExtractionStrategy::for_source(&configured),
            ExtractionStrategy::Selector {
                headline: "h3.title".to_string(),
                link: None
            }
        );
    }

    #[test]
    fn registry_lookup_ignores_key_case() {
        for key in ["BORSEN", "Finans", "e24"] {
            assert_eq!(ExtractionStrategy::for_source(&source(key)), ExtractionStrategy::TeaserCards);
        }
    }

    #[test]
    fn registry_wins_over_configured_selector() {
        let mut s = source("dn");
        s.headline_selector = Some("h2.title".to_string());
        assert_eq!(ExtractionStrategy::for_source(&s), ExtractionStrategy::TeaserCards);
    }

    #[test]
    fn explicit_strategy_overrides_registry() {
        let mut s = source("borsen");
        s.strategy = Some("anchor_text".to_string());
        assert_eq!(ExtractionStrategy::for_source(&s), ExtractionStrategy::AnchorText);
    }

    #[test]
    fn unknown_strategy_name_falls_back_to_anchor_text() {
        let mut s = source("x");
        s.strategy = Some("telepathy".to_string());
        assert_eq!(ExtractionStrategy::for_source(&s), ExtractionStrategy::AnchorText);
    }

    #[test]
    fn selector_finds_enclosing_anchor() {
        let doc = Html::parse_document(
            r#"<a href="/a/1"><h3 class="title">Stifter sælger aktiemajoritet til PE-fond</h3></a>"#,
        );
        let found = ExtractionStrategy::Selector {
            headline: "h3.title".to_string(),
            link: None,
        }
        .apply(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, "/a/1");
    }

    #[test]
    fn teaser_cards_pair_heading_with_link() {
        let doc = Html::parse_document(
            r#"<div class="teaser-large"><h2>Milliardær køber ejendomsportefølje</h2><a href="/b/2">Læs mere</a></div>"#,
        );
        let found = ExtractionStrategy::TeaserCards.apply(&doc);
        assert_eq!(
            found,
            vec![("Milliardær køber ejendomsportefølje".to_string(), "/b/2".to_string())]
        );
    }

    #[test]
    fn invalid_selector_yields_nothing() {
        let doc = Html::parse_document("<p>hi</p>");
        let found = ExtractionStrategy::Selector {
            headline: "h3[[".to_string(),
            link: None,
        }
        .apply(&doc);
        assert!(found.is_empty());
    }
}
