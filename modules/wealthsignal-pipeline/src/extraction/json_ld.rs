use scraper::{Html, Selector};
use serde_json::Value;

const ARTICLE_TYPES: &[&str] = &[
    "NewsArticle",
    "Article",
    "ReportageNewsArticle",
    "AnalysisNewsArticle",
    "BlogPosting",
];

/// `(headline, href)` pairs found in the page's JSON-LD blocks.
///
/// Handles `ItemList` listings, standalone `NewsArticle`/`Article` objects,
/// top-level arrays and `@graph` containers. Blocks that fail to parse are
/// skipped.
pub fn extract_json_ld(document: &Html) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        walk(&value, &mut found);
    }
    found
}

fn walk(value: &Value, found: &mut Vec<(String, String)>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| walk(v, found)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                walk(graph, found);
            }
            if has_type(value, &["ItemList"]) {
                if let Some(Value::Array(elements)) = map.get("itemListElement") {
                    for element in elements {
                        if let Some(pair) = list_item(element) {
                            found.push(pair);
                        }
                    }
                }
            } else if has_type(value, ARTICLE_TYPES) {
                if let Some(pair) = article_pair(value) {
                    found.push(pair);
                }
            }
        }
        _ => {}
    }
}

fn has_type(value: &Value, wanted: &[&str]) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => wanted.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| wanted.contains(&t)),
        _ => false,
    }
}

/// A `ListItem` either carries `name`/`url` itself or wraps an `item`.
fn list_item(element: &Value) -> Option<(String, String)> {
    if let Some(item) = element.get("item") {
        if item.is_object() {
            if let Some(pair) = article_pair(item) {
                return Some(pair);
            }
        }
    }
    let headline = str_field(element, "name").or_else(|| str_field(element, "headline"))?;
    let url = str_field(element, "url").or_else(|| element.get("item").and_then(Value::as_str))?;
    Some((headline.to_string(), url.to_string()))
}

fn article_pair(value: &Value) -> Option<(String, String)> {
    let headline = str_field(value, "headline").or_else(|| str_field(value, "name"))?;
    let url = str_field(value, "url").or_else(|| match value.get("mainEntityOfPage") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(entity) => str_field(entity, "@id"),
        None => None,
    })?;
    Some((headline.to_string(), url.to_string()))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
