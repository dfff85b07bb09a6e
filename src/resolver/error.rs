//! Error types for resolution strategies.
//!
//! Strategy errors never escape [`super::ResolutionChain`]; they are logged
//! and recorded as attempts. The one exception an operator sees is
//! [`ResolveError::Configuration`], which is also checked at startup.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors a [`super::ResolutionStrategy`] can report.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transport failure after the retry budget was spent.
    #[error("network error in {strategy} for '{doi}': {source}")]
    Network {
        /// Strategy that issued the request
        strategy: &'static str,
        /// Identifier being resolved
        doi: String,
        /// Underlying transport error
        #[source]
        source: DownloadError,
    },

    /// Strategy cannot run as configured
    #[error("{strategy} is misconfigured: {reason}\n  Suggestion: {suggestion}")]
    Configuration {
        /// Strategy that rejected its configuration
        strategy: &'static str,
        /// What is wrong
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A response arrived but could not be understood
    #[error("{strategy} could not parse response for '{doi}': {reason}")]
    Parse {
        /// Strategy that received the payload
        strategy: &'static str,
        /// Identifier being resolved
        doi: String,
        /// Parse failure detail
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `Network` error.
    #[must_use]
    pub fn network(strategy: &'static str, doi: &str, source: DownloadError) -> Self {
        Self::Network {
            strategy,
            doi: doi.to_string(),
            source,
        }
    }

    /// Creates a `Configuration` error.
    #[must_use]
    pub fn configuration(
        strategy: &'static str,
        reason: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            strategy,
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(strategy: &'static str, doi: &str, reason: impl ToString) -> Self {
        Self::Parse {
            strategy,
            doi: doi.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for configuration errors.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
