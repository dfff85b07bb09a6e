//! Error types for identifier parsing and page scraping.

use thiserror::Error;

/// Errors that can occur while parsing identifiers or remote payloads.
///
/// Scraping callers never propagate these: a malformed page or metadata
/// document degrades to an empty result at the call site.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Input does not look like a DOI after normalization.
    #[error("invalid DOI '{input}': {reason}\n  Suggestion: {suggestion}")]
    InvalidDoi {
        /// The raw input that failed validation
        input: String,
        /// Why the DOI is invalid
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// A remote document could not be decoded into the expected shape.
    #[error("malformed {payload} payload: {reason}")]
    MalformedPayload {
        /// What was being decoded (e.g. "crossref", "unpaywall")
        payload: &'static str,
        /// Decoder message
        reason: String,
    },
}

impl ParseError {
    /// Creates an `InvalidDoi` error.
    #[must_use]
    pub fn invalid_doi(input: &str, reason: &str) -> Self {
        Self::InvalidDoi {
            input: input.to_string(),
            reason: reason.to_string(),
            suggestion: "Use the form 10.NNNN/suffix, optionally prefixed by https://doi.org/"
                .to_string(),
        }
    }

    /// Creates a `MalformedPayload` error.
    #[must_use]
    pub fn malformed(payload: &'static str, reason: impl ToString) -> Self {
        Self::MalformedPayload {
            payload,
            reason: reason.to_string(),
        }
    }
}
