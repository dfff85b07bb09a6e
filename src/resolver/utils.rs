//! Shared helpers for strategies: URL joining and anchor scanning.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

/// Compiles a CSS selector at static init; panics on an invalid pattern.
pub(crate) fn compile_static_selector(pattern: &str) -> Selector {
    Selector::parse(pattern).unwrap_or_else(|e| panic!("invalid static selector '{pattern}': {e}"))
}

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| compile_static_selector("a[href]"));

/// Path segments that publishers use for document downloads.
const DOCUMENT_PATH_SEGMENTS: &[&str] = &["/pdf/", "/content/pdf/"];

/// Anchor text that suggests a document link.
const DOCUMENT_LINK_TEXT: &[&str] = &["pdf", "full text"];

/// Resolves a possibly relative URL string against `base`.
///
/// Normalizes `//host/...` to `https://host/...`. Returns `None` for empty
/// values and anything that does not produce an http(s) URL.
#[must_use]
pub fn absolutize_url(value: &str, base: &Url) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let joined = if value.starts_with("//") {
        Url::parse(&format!("https:{value}")).ok()?
    } else {
        base.join(value).ok()?
    };
    matches!(joined.scheme(), "http" | "https").then_some(joined)
}

/// Finds the best document link on a landing page.
///
/// Precedence, first match in document order within each rule:
/// 1. href ends in `.pdf`
/// 2. href contains `/pdf/` or `/content/pdf/`
/// 3. anchor text contains `pdf` or `full text`
///
/// Relative links are resolved against `base`, which should be the final
/// (post-redirect) page URL.
#[must_use]
pub fn find_document_link(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let anchors: Vec<(String, String)> = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim().to_string();
            let text = a.text().collect::<String>().to_lowercase();
            Some((href, text))
        })
        .collect();

    let by_suffix = |href: &str, _: &str| {
        let path = href.split(['?', '#']).next().unwrap_or(href);
        path.to_ascii_lowercase().ends_with(".pdf")
    };
    let by_segment = |href: &str, _: &str| {
        let lower = href.to_ascii_lowercase();
        DOCUMENT_PATH_SEGMENTS.iter().any(|s| lower.contains(s))
    };
    let by_text = |_: &str, text: &str| DOCUMENT_LINK_TEXT.iter().any(|t| text.contains(t));

    let rules: [&dyn Fn(&str, &str) -> bool; 3] = [&by_suffix, &by_segment, &by_text];
    rules.iter().find_map(|rule| {
        anchors
            .iter()
            .filter(|(href, text)| rule(href, text))
            .find_map(|(href, _)| absolutize_url(href, base))
    })
}
