use scraper::{Html, Selector};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{debug, warn};
use wealthsignal_common::collapse_whitespace;

/// Article body from a rendered page.
///
/// Configured selectors are tried in order; the first one whose matched
/// text reaches `min_chars` wins. Otherwise Readability extraction runs over
/// the whole page. Returns `None` when nothing reaches `min_chars`.
pub fn extract_article_text(html: &str, url: &str, selectors: &[String], min_chars: usize) -> Option<String> {
    let document = Html::parse_document(html);
    for css in selectors {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(e) => {
                warn!(selector = css.as_str(), error = %e, "Invalid article selector");
                continue;
            }
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty())
            .collect();
        let text = paragraphs.join("\n\n");
        if text.chars().count() >= min_chars {
            debug!(url, selector = css.as_str(), chars = text.len(), "Article body from selector");
            return Some(text);
        }
    }

    let text = readability(html, url);
    if text.chars().count() >= min_chars {
        debug!(url, chars = text.len(), "Article body from Readability");
        Some(text)
    } else {
        None
    }
}

fn readability(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config).trim().to_string()
}
