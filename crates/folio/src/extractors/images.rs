// ABOUTME: Image candidate collection: every img src in document order, resolved against the page URL.
// ABOUTME: Relevance filtering is applied afterwards by the active profile's ImageFilter.

use scraper::Html;
use url::Url;

use crate::extractors::compiled::get_or_compile;
use crate::profiles::ImageFilter;

/// Collects the `src` of every `img` element in document order.
///
/// Elements without a `src` (or with a blank one) are skipped. Sources are
/// resolved against `base_url` when given; duplicates are kept.
pub fn collect_image_sources(doc: &Html, base_url: Option<&Url>) -> Vec<String> {
    let Some(selector) = get_or_compile("img[src]") else {
        return Vec::new();
    };

    doc.select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve_image_url(src, base_url))
        .collect()
}

/// Applies a relevance predicate without reordering.
pub fn filter_relevant(candidates: Vec<String>, filter: &ImageFilter) -> Vec<String> {
    candidates.into_iter().filter(|url| filter.accept(url)).collect()
}

/// Resolves a potentially relative image URL against a base URL.
///
/// Absolute `http(s)` and `data:` sources are returned unchanged. Without a
/// base, or when joining fails, relative sources are returned as written so
/// they are still recorded as candidates.
pub fn resolve_image_url(src: &str, base_url: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    if src.starts_with("http://") || src.starts_with("https://") || src.starts_with("data:") {
        return Some(src.to_string());
    }

    match base_url {
        Some(base) => Some(
            base.join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string()),
        ),
        None => Some(src.to_string()),
    }
}
