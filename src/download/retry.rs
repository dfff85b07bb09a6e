//! Bounded retry with exponential backoff for transient request failures.
//!
//! # Overview
//!
//! Each failed attempt is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - connection errors, timeouts, and statuses in
//!   the policy's retry list (500/502/503/504 by default)
//! - [`FailureType::RateLimited`] - HTTP 429 (retried, honoring Retry-After)
//! - [`FailureType::Permanent`] - everything else
//!
//! [`RetryPolicy::should_retry`] then decides whether another attempt is
//! allowed and how long to wait first.
//!
//! # Example
//!
//! ```
//! use refcrawler_core::download::{DownloadError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://api.crossref.org/works/x", 503);
//!
//! match policy.should_retry(policy.classify(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::DownloadError;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff factor in seconds.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.5;

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Upper bound on any single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Maximum jitter added to delays.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Server rate limiting (HTTP 429).
    RateLimited,

    /// Failure that won't succeed regardless of retries.
    Permanent,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget and backoff configuration.
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(backoff_factor * 2^(n-1), 30s) + jitter
/// ```
///
/// where `n` is the attempt that just failed. With the defaults the waits
/// are roughly 0.5s, 1s, 2s before the budget of 3 retries is spent.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    max_retries: u32,

    /// Base of the exponential backoff, in seconds.
    backoff_factor: f64,

    /// Statuses considered transient.
    retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom retry count and backoff factor.
    ///
    /// Negative or non-finite backoff factors are treated as zero.
    #[must_use]
    pub fn new(max_retries: u32, backoff_factor: f64) -> Self {
        let backoff_factor = if backoff_factor.is_finite() {
            backoff_factor.max(0.0)
        } else {
            0.0
        };
        Self {
            max_retries,
            backoff_factor,
            ..Self::default()
        }
    }

    /// Replaces the list of retryable statuses.
    #[must_use]
    pub fn with_retry_statuses(mut self, statuses: &[u16]) -> Self {
        self.retry_statuses = statuses.to_vec();
        self
    }

    /// Returns the number of retries allowed after the initial attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff factor in seconds.
    #[must_use]
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    /// Returns true if `status` is in the retry list.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Determines whether to retry after a failed attempt.
    ///
    /// `attempt` is the attempt that just failed (1-indexed).
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt > self.max_retries {
            debug!(attempt, max = self.max_retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        let delay = self.calculate_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Classifies a transport error for retry decisions.
    ///
    /// | Error | Type |
    /// |-------|------|
    /// | `HttpStatus` 429 in retry list | RateLimited |
    /// | `HttpStatus` other in retry list | Transient |
    /// | `HttpStatus` not in list | Permanent |
    /// | `Timeout` | Transient |
    /// | `Network` (TLS) | Permanent |
    /// | `Network` (other) | Transient |
    /// | anything else | Permanent |
    #[must_use]
    pub fn classify(&self, error: &DownloadError) -> FailureType {
        match error {
            DownloadError::HttpStatus { status, .. } => self.classify_status(*status),
            DownloadError::Timeout { .. } => FailureType::Transient,
            DownloadError::Network { source, .. } => {
                if is_tls_error(source) {
                    FailureType::Permanent
                } else {
                    FailureType::Transient
                }
            }
            DownloadError::NotDocument { .. }
            | DownloadError::Io { .. }
            | DownloadError::InvalidUrl { .. }
            | DownloadError::ClientBuild { .. } => FailureType::Permanent,
        }
    }

    /// Classifies an HTTP status against the retry list.
    #[must_use]
    pub fn classify_status(&self, status: u16) -> FailureType {
        if !self.is_retryable_status(status) {
            FailureType::Permanent
        } else if status == 429 {
            FailureType::RateLimited
        } else {
            FailureType::Transient
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.backoff_factor == 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.backoff_factor * 2f64.powi(exponent);
        let capped = Duration::from_secs_f64(delay_secs.min(MAX_DELAY.as_secs_f64()));

        // Jitter is at most 10% of the base delay.
        let jitter_cap = (capped.as_millis() as u64 / 10).min(MAX_JITTER.as_millis() as u64);
        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_cap);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}
