//! Metadata oracle and citation index.
//!
//! The oracle is the source of truth for a work's title, its reference list,
//! and its author affiliations. Lookups never fail loudly: a network error or
//! a missing record is `None`, which callers read as "cannot verify".
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refcrawler_core::download::{HttpClient, RateLimiter, TransportConfig};
//! use refcrawler_core::metadata::{CrossrefOracle, MetadataOracle};
//! use refcrawler_core::parser::Doi;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new(TransportConfig::default(), Arc::new(RateLimiter::disabled()))?);
//! let oracle = CrossrefOracle::new(client);
//! let doi = Doi::parse("10.1126/science.177.4047.393").ok_or("bad doi")?;
//! if let Some(record) = oracle.lookup(&doi).await {
//!     println!("{:?} cites {} works", record.title, record.references.len());
//! }
//! # Ok(())
//! # }
//! ```

mod citations;
mod crossref;

use async_trait::async_trait;

use crate::parser::Doi;

pub use citations::{CitationIndex, SemanticScholarIndex};
pub use crossref::{CrossrefOracle, DEFAULT_MEMO_CAPACITY};

/// Affiliation tokens that suggest a student or early-career author.
pub const DEFAULT_YOUNG_KEYWORDS: &[&str] = &[
    "student",
    "phd",
    "doctoral",
    "candidate",
    "undergraduate",
    "master",
    "硕士",
    "博士",
    "博后",
    "研究生",
    "学生",
    "博士生",
    "博士候选人",
    "本科生",
];

/// Returns [`DEFAULT_YOUNG_KEYWORDS`] as owned strings.
#[must_use]
pub fn default_young_keywords() -> Vec<String> {
    DEFAULT_YOUNG_KEYWORDS
        .iter()
        .map(|k| (*k).to_string())
        .collect()
}

/// Authoritative metadata for one work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Registered title, if the record has one.
    pub title: Option<String>,
    /// DOIs this work cites (normalized, deduplicated).
    pub references: Vec<Doi>,
    /// Every author affiliation name on the record.
    pub affiliations: Vec<String>,
}

impl MetadataRecord {
    /// Returns true if any affiliation contains any keyword (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use refcrawler_core::metadata::{MetadataRecord, default_young_keywords};
    ///
    /// let record = MetadataRecord {
    ///     affiliations: vec!["PhD candidate, Dept. of Physics".to_string()],
    ///     ..MetadataRecord::default()
    /// };
    /// assert!(record.has_young_author(&default_young_keywords()));
    /// ```
    #[must_use]
    pub fn has_young_author(&self, keywords: &[String]) -> bool {
        self.affiliations.iter().any(|affiliation| {
            let affiliation = affiliation.to_lowercase();
            keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .any(|k| affiliation.contains(&k))
        })
    }
}

/// Source of authoritative metadata.
#[async_trait]
pub trait MetadataOracle: Send + Sync {
    /// Looks up `doi`. `None` means the record is missing or unreachable.
    async fn lookup(&self, doi: &Doi) -> Option<MetadataRecord>;
}
