//! DOI normalization and the [`Doi`] key type.
//!
//! Every identifier that enters the crawler (CLI input, scraped references,
//! metadata references, citation index results) passes through
//! [`Doi::parse`], so two spellings of the same work always collapse to one
//! key in dedup sets, frontiers and the history file.
//!
//! # Example
//!
//! ```
//! use refcrawler_core::parser::Doi;
//!
//! let a = Doi::parse("https://doi.org/10.1126/Science.177.4047.393").unwrap();
//! let b = Doi::parse("doi:10.1126/science.177.4047.393.").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "10.1126/science.177.4047.393");
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

use super::error::ParseError;

/// Resolver-host and scheme prefixes stripped during normalization.
#[allow(clippy::expect_used)]
static DOI_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:)")
        .expect("DOI prefix regex is valid") // Static pattern, safe to panic
});

/// Shape check for validated input: `10.NNNN[.NNN]/suffix`.
#[allow(clippy::expect_used)]
static DOI_SHAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^10\.\d{4,9}(?:\.\d+)*/\S+$").expect("DOI shape regex is valid") // Static pattern, safe to panic
});

/// Characters trimmed from the end of an identifier.
const TRAILING_PUNCTUATION: &[char] = &[' ', '.', ';'];

/// A normalized DOI.
///
/// The inner string is the canonical key: percent-decoded, stripped of
/// `https://doi.org/`, `dx.doi.org` and `doi:` prefixes, trimmed of trailing
/// ` .;`, and ASCII-lowercased (DOIs are case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Doi(String);

impl Doi {
    /// Normalizes `raw` into a DOI key.
    ///
    /// Returns `None` when nothing is left after normalization. No shape
    /// validation is applied; use [`Doi::parse_strict`] for operator input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            trace!(raw, "identifier normalized to empty string");
            return None;
        }
        Some(Self(normalized))
    }

    /// Normalizes `raw` and checks it has the `10.NNNN/suffix` shape.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidDoi`] when the normalized value is empty or
    /// does not look like a DOI.
    pub fn parse_strict(raw: &str) -> Result<Self, ParseError> {
        let Some(doi) = Self::parse(raw) else {
            return Err(ParseError::invalid_doi(raw, "empty identifier"));
        };
        if !looks_like_doi(doi.as_str()) {
            return Err(ParseError::invalid_doi(
                raw,
                "expected '10.' followed by a 4-9 digit registrant, '/', and a suffix",
            ));
        }
        Ok(doi)
    }

    /// Returns the normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier percent-encoded for use as a single URL path segment.
    #[must_use]
    pub fn encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Doi {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Deserialization re-normalizes so hand-edited history files still key correctly.
impl<'de> Deserialize<'de> for Doi {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom("empty DOI"))
    }
}

/// Returns true if `value` has the `10.NNNN/suffix` shape.
#[must_use]
pub fn looks_like_doi(value: &str) -> bool {
    DOI_SHAPE_PATTERN.is_match(value.trim())
}

/// Splits comma/whitespace separated input into normalized DOIs.
///
/// Empty fragments are ignored and duplicates (after normalization) are
/// dropped, keeping first-occurrence order.
#[tracing::instrument(skip(raw), fields(input_len = raw.len()))]
#[must_use]
pub fn parse_identifier_list(raw: &str) -> Vec<Doi> {
    let mut out: Vec<Doi> = Vec::new();
    for fragment in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let Some(doi) = Doi::parse(fragment) else {
            continue;
        };
        if out.contains(&doi) {
            debug!(doi = %doi, "duplicate identifier in input");
            continue;
        }
        out.push(doi);
    }
    out
}

/// Applies one normalization pass until the value stops changing.
fn normalize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(input: &str) -> String {
    let decoded = match urlencoding::decode(input) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => input.to_string(),
    };
    let trimmed = decoded.trim();
    let stripped = DOI_PREFIX_PATTERN.replace(trimmed, "");
    stripped
        .trim()
        .trim_end_matches(TRAILING_PUNCTUATION)
        .to_ascii_lowercase()
}
