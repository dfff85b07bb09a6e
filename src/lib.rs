//! Refcrawler Core Library
//!
//! This library provides the core functionality for the refcrawler tool,
//! which starts from one or more DOIs, downloads each work as a PDF,
//! verifies it against its registered title, and follows the citation graph
//! level by level.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - DOI normalization and reference extraction from HTML
//! - [`download`] - Rate-limited HTTP transport with retries and PDF fetch
//! - [`metadata`] - Crossref metadata oracle and citing-work lookups
//! - [`resolver`] - Ordered strategy chain from DOI to document URL
//! - [`pipeline`] - Per-DOI download, verification and storage
//! - [`history`] - Durable record of verified downloads
//! - [`crawler`] - Depth-bounded concurrent crawl over the reference graph
//! - [`config`] - Validated run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawler;
pub mod download;
pub mod history;
pub mod metadata;
pub mod parser;
pub mod pipeline;
pub mod resolver;
#[cfg(test)]
pub(crate) mod test_support;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, CrawlerConfig};
pub use crawler::{CrawlObserver, CrawlOptions, CrawlReport, Crawler, YoungFilter};
pub use download::{DownloadError, HttpClient, RateLimiter, RequestKind, RetryPolicy};
pub use history::{HistoryRecord, HistoryStore};
pub use metadata::{CitationIndex, CrossrefOracle, MetadataOracle, MetadataRecord};
pub use parser::{Doi, ParseError};
pub use pipeline::{DocumentPipeline, DocumentProcessor, DownloadOutcome, OutcomeStatus};
pub use resolver::{ResolutionChain, ResolutionResult, ResolutionStrategy, build_default_chain};
