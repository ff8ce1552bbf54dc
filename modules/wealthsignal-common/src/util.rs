// Shared URL, text and vector helpers used across the store and pipeline crates.

use url::Url;

/// Cosine similarity for f32 embedding vectors. Returns 0.0 for zero-norm or
/// mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Strip tracking parameters that cause dedup mismatches between runs.
pub fn sanitize_url(url: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "fbclid",
        "gclid",
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "ref",
        "mc_cid",
        "mc_eid",
    ];

    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    if parsed.query().is_none() {
        return url.to_string();
    }

    let clean_pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if clean_pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
    }

    parsed.to_string()
}

/// Resolve an `href` found on a page into an absolute http(s) link.
///
/// Fragments are dropped and tracking parameters stripped so the same story
/// linked two ways collapses to one key. Returns `None` for `javascript:`,
/// `mailto:`, bare fragments and anything that does not resolve.
pub fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
    {
        return None;
    }

    let base = Url::parse(base_url).ok()?;
    let mut joined = base.join(href).ok()?;
    if joined.scheme() != "http" && joined.scheme() != "https" {
        return None;
    }
    joined.set_fragment(None);
    Some(sanitize_url(joined.as_str()))
}

/// Lowercased host without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key for person names: trimmed, single-spaced, lowercase.
pub fn normalize_name(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

/// Lowercase, hyphen-separated slug. Keeps non-ASCII letters (æ, ø, å).
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Keep at most `max_words` words. Appends an ellipsis when anything was cut.
pub fn truncate_words(s: &str, max_words: usize) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    let mut out = words[..max_words].join(" ");
    out.push('…');
    out
}

pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical() {
        let a = vec![1.0_f32, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn cosine_similarity_orthogonal_and_zero() {
        let a = vec![1.0_f32, 0.0, 0.0];
        let b = vec![0.0_f32, 1.0, 0.0];
        let z = vec![0.0_f32, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &z), 0.0);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn sanitize_url_strips_tracking() {
        let clean = sanitize_url("https://example.com/page?id=123&utm_source=twitter&fbclid=abc");
        assert!(clean.contains("id=123"));
        assert!(!clean.contains("utm_source"));
        assert!(!clean.contains("fbclid"));
    }

    #[test]
    fn sanitize_url_removes_all_tracking() {
        let clean = sanitize_url("https://example.com/page?utm_source=x&utm_medium=y");
        assert!(!clean.contains('?'));
    }

    #[test]
    fn resolve_link_makes_relative_links_absolute() {
        assert_eq!(
            resolve_link("https://borsen.dk/", "/nyheder/virksomheder/salg#top").as_deref(),
            Some("https://borsen.dk/nyheder/virksomheder/salg")
        );
        assert_eq!(
            resolve_link("https://borsen.dk/sektion/", "artikel-1").as_deref(),
            Some("https://borsen.dk/sektion/artikel-1")
        );
    }

    #[test]
    fn resolve_link_rejects_non_navigational_hrefs() {
        assert!(resolve_link("https://borsen.dk", "javascript:void(0)").is_none());
        assert!(resolve_link("https://borsen.dk", "mailto:tips@borsen.dk").is_none());
        assert!(resolve_link("https://borsen.dk", "#").is_none());
        assert!(resolve_link("https://borsen.dk", "").is_none());
    }

    #[test]
    fn host_of_strips_www() {
        assert_eq!(host_of("https://www.DN.no/x").as_deref(), Some("dn.no"));
        assert!(host_of("not a url").is_none());
    }

    #[test]
    fn slugify_keeps_nordic_letters() {
        assert_eq!(slugify("  Mærsk sells Svitzer  "), "mærsk-sells-svitzer");
        assert_eq!(slugify("A/S -- Deal!"), "a-s-deal");
    }

    #[test]
    fn truncate_words_bounds_length() {
        let s = "one two three four five";
        assert_eq!(truncate_words(s, 10), s);
        let cut = truncate_words(s, 3);
        assert_eq!(word_count(&cut), 3);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn normalize_name_folds_case_and_spacing() {
        assert_eq!(normalize_name("  Kjeld  Kirk Kristiansen "), "kjeld kirk kristiansen");
    }
}
