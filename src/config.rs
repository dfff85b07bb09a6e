//! Validated, immutable run configuration.
//!
//! The binary merges CLI flags and the optional config file into one
//! [`CrawlerConfig`], validates it once at startup, and hands pieces of it to
//! the transport, the resolution chain and the crawler. Validation errors are
//! the only errors that stop a run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::crawler::{CrawlOptions, DEFAULT_MAX_DEPTH, DEFAULT_WORKERS, YoungFilter};
use crate::download::constants::DEFAULT_REQUEST_TIMEOUT;
use crate::download::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, RateLimiter, RetryPolicy, TransportConfig,
};
use crate::parser::Doi;
use crate::pipeline::DEFAULT_OUTPUT_ROOT;

/// Largest accepted worker-pool width.
pub const MAX_WORKERS: usize = 64;

/// Largest accepted retry budget.
pub const MAX_RETRIES: u32 = 10;

/// Largest accepted citation-expansion page.
pub const MAX_CITED_ROWS: usize = 200;

/// Default number of search matches added as roots.
pub const DEFAULT_RECENT_ROWS: usize = 5;

/// Errors found while validating a [`CrawlerConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A numeric setting is outside its accepted range
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Setting name
        field: &'static str,
        /// Offending value
        value: String,
        /// Accepted range
        expected: &'static str,
    },

    /// No usable root identifiers were supplied
    #[error("no valid DOI to crawl\n  Suggestion: Pass --doi 10.xxxx/yyyy (comma or space separated)")]
    NoRoots,

    /// A mirror entry is not an http(s) URL
    #[error("invalid mirror URL '{url}'\n  Suggestion: Mirrors must be absolute http(s) base URLs")]
    InvalidMirror {
        /// Offending entry
        url: String,
    },

    /// The young-author filter has no keywords
    #[error("young-author filter enabled with an empty keyword list\n  Suggestion: Omit --young-keywords to use the defaults")]
    EmptyKeywords,
}

impl ConfigError {
    fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Everything a run needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    /// Root identifiers, normalized and deduplicated.
    pub roots: Vec<Doi>,
    /// Deepest crawl level (inclusive).
    pub max_depth: usize,
    /// Worker-pool width.
    pub workers: usize,
    /// Optional young-author admission gate.
    pub young_filter: Option<YoungFilter>,
    /// Global requests per second; 0 disables limiting.
    pub rps: f64,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Exponential backoff factor in seconds.
    pub backoff: f64,
    /// Timeout for metadata API requests.
    pub timeout: Duration,
    /// Contact email for the open-access index.
    pub unpaywall_email: Option<String>,
    /// Ordered mirror base URLs.
    pub mirrors: Vec<String>,
    /// Citation expansion page size, when enabled.
    pub cited_rows: Option<usize>,
    /// Search query whose newest matches are added as roots.
    pub recent_query: Option<String>,
    /// Number of search matches to add.
    pub recent_rows: usize,
    /// Storage root for documents and history.
    pub output_root: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            young_filter: None,
            rps: 0.0,
            retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF_FACTOR,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            unpaywall_email: None,
            mirrors: Vec::new(),
            cited_rows: None,
            recent_query: None,
            recent_rows: DEFAULT_RECENT_ROWS,
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
        }
    }
}

impl CrawlerConfig {
    /// Checks every setting against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() && self.recent_query.is_none() {
            return Err(ConfigError::NoRoots);
        }
        if self.recent_query.is_some() && !(1..=MAX_CITED_ROWS).contains(&self.recent_rows) {
            return Err(ConfigError::out_of_range("recent_rows", self.recent_rows, "1..=200"));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::out_of_range("workers", self.workers, "1..=64"));
        }
        if !self.rps.is_finite() || self.rps < 0.0 {
            return Err(ConfigError::out_of_range("rps", self.rps, ">= 0"));
        }
        if self.retries > MAX_RETRIES {
            return Err(ConfigError::out_of_range("retries", self.retries, "0..=10"));
        }
        if !self.backoff.is_finite() || !(0.0..=60.0).contains(&self.backoff) {
            return Err(ConfigError::out_of_range("backoff", self.backoff, "0..=60"));
        }
        if self.timeout.is_zero() || self.timeout > Duration::from_secs(3600) {
            return Err(ConfigError::out_of_range(
                "timeout",
                self.timeout.as_secs_f64(),
                "(0, 3600] seconds",
            ));
        }
        if let Some(rows) = self.cited_rows
            && !(1..=MAX_CITED_ROWS).contains(&rows)
        {
            return Err(ConfigError::out_of_range("cited_rows", rows, "1..=200"));
        }
        if let Some(filter) = &self.young_filter
            && filter.keywords.iter().all(|k| k.trim().is_empty())
        {
            return Err(ConfigError::EmptyKeywords);
        }
        for mirror in &self.mirrors {
            let valid = url::Url::parse(mirror)
                .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host());
            if !valid {
                return Err(ConfigError::InvalidMirror {
                    url: mirror.clone(),
                });
            }
        }
        Ok(())
    }

    /// Transport settings derived from this configuration.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            retry: RetryPolicy::new(self.retries, self.backoff),
        }
    }

    /// The process-wide rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::from_rps(self.rps))
    }

    /// Crawler options derived from this configuration.
    #[must_use]
    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_depth: self.max_depth,
            workers: self.workers,
            young_filter: self.young_filter.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> CrawlerConfig {
        CrawlerConfig {
            roots: vec![Doi::parse("10.1126/science.177.4047.393").unwrap()],
            ..CrawlerConfig::default()
        }
    }

    #[test]
    fn test_default_values() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.workers, 4);
        assert_eq!(config.retries, 3);
        assert!((config.backoff - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.output_root, PathBuf::from("Downloads_pdf/sample"));
        assert!(config.young_filter.is_none());
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn test_no_roots_rejected() {
        assert_eq!(CrawlerConfig::default().validate(), Err(ConfigError::NoRoots));
    }

    #[test]
    fn test_recent_query_stands_in_for_roots() {
        let config = CrawlerConfig {
            recent_query: Some("graph neural networks".into()),
            ..CrawlerConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));

        let config = CrawlerConfig {
            recent_rows: 0,
            ..config
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workers_range() {
        let mut config = valid();
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "workers", .. })
        ));
        config.workers = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rps_must_be_non_negative_and_finite() {
        let mut config = valid();
        config.rps = -1.0;
        assert!(config.validate().is_err());
        config.rps = f64::NAN;
        assert!(config.validate().is_err());
        config.rps = 2.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_must_be_positive() {
        let mut config = valid();
        config.timeout = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_mirror_must_be_http_url() {
        let mut config = valid();
        config.mirrors = vec!["https://mirror.example".into(), "ftp://nope".into()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidMirror {
                url: "ftp://nope".into()
            })
        );
    }

    #[test]
    fn test_empty_young_keywords_rejected() {
        let mut config = valid();
        config.young_filter = Some(YoungFilter {
            target_depth: 2,
            keywords: vec![" ".into()],
        });
        assert_eq!(config.validate(), Err(ConfigError::EmptyKeywords));
    }

    #[test]
    fn test_cited_rows_range() {
        let mut config = valid();
        config.cited_rows = Some(0);
        assert!(config.validate().is_err());
        config.cited_rows = Some(200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_components() {
        let mut config = valid();
        config.rps = 0.0;
        config.retries = 5;
        config.max_depth = 3;
        assert!(config.rate_limiter().is_disabled());
        assert_eq!(config.transport_config().retry.max_retries(), 5);
        assert_eq!(config.crawl_options().max_depth, 3);
    }
}
