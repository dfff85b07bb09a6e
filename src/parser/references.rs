//! Reference and title extraction from HTML landing pages.
//!
//! Both functions are best-effort: malformed markup yields an empty set or
//! `None`, never an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;

use super::doi::Doi;

/// Bare DOIs anywhere in the page source.
#[allow(clippy::expect_used)]
static DOI_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+").expect("DOI text regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

#[allow(clippy::expect_used)]
static CITATION_DOI_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="citation_doi"]"#).expect("citation_doi selector is valid")
});

#[allow(clippy::expect_used)]
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

/// Collects the DOIs a page links to or mentions.
///
/// Sources, all normalized through [`Doi::parse`]:
/// - `<a href>` values containing `doi.org/` (query and fragment dropped)
/// - `<meta name="citation_doi">` content
/// - every `10.NNNN/...` match in the raw source
///
/// `own` (the page's own DOI) is removed from the result.
#[must_use]
pub fn extract_references(html: &str, own: Option<&Doi>) -> HashSet<Doi> {
    let document = Html::parse_document(html);
    let mut found: HashSet<Doi> = HashSet::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(idx) = href.find("doi.org/") else {
            continue;
        };
        let tail = &href[idx + "doi.org/".len()..];
        let tail = tail.split(['?', '#']).next().unwrap_or_default();
        if let Some(doi) = Doi::parse(tail) {
            found.insert(doi);
        }
    }

    for element in document.select(&CITATION_DOI_SELECTOR) {
        if let Some(doi) = element.value().attr("content").and_then(Doi::parse) {
            found.insert(doi);
        }
    }

    for m in DOI_IN_TEXT.find_iter(html) {
        if let Some(doi) = Doi::parse(m.as_str()) {
            found.insert(doi);
        }
    }

    if let Some(own) = own {
        found.remove(own);
    }
    trace!(count = found.len(), "extracted references from page");
    found
}

/// Returns the trimmed text of the page's `<title>`, if non-empty.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()?
        .text()
        .collect::<String>();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}
