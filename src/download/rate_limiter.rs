//! Process-wide request throttling.
//!
//! This module provides the [`RateLimiter`] struct which enforces a minimum
//! interval between *any* two outbound requests, regardless of host.
//!
//! # Overview
//!
//! There is one slot for the whole process: metadata lookups, landing pages,
//! open-access queries, mirrors and PDF fetches all queue on the same
//! `last_request` timestamp. A single remote service blocking us is enough to
//! stall a crawl, so the ceiling is global rather than per-domain.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use refcrawler_core::download::RateLimiter;
//!
//! # async fn example() {
//! // At most 2 requests per second across every caller
//! let limiter = Arc::new(RateLimiter::from_rps(2.0));
//!
//! // First request proceeds immediately
//! limiter.acquire().await;
//!
//! // Second request waits ~500ms
//! limiter.acquire().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};

/// Global minimum-interval rate limiter.
///
/// Designed to be wrapped in `Arc` and shared by every component that talks
/// to the network. The `tokio::sync::Mutex` is held only while checking the
/// elapsed time, sleeping out the remainder, and stamping the new time; the
/// caller's HTTP request happens after the guard is dropped.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two consecutive requests.
    min_interval: Duration,

    /// Whether rate limiting is disabled (`--rps 0`).
    disabled: bool,

    /// Time of the last request. `None` until the first request.
    last_request: Mutex<Option<Instant>>,

    /// Total time callers have spent waiting, in milliseconds.
    cumulative_delay_ms: AtomicU64,
}

impl RateLimiter {
    /// Creates a rate limiter with the given minimum interval.
    ///
    /// A zero interval is equivalent to [`RateLimiter::disabled`].
    #[must_use]
    #[instrument(skip_all, fields(interval_ms = min_interval.as_millis()))]
    pub fn new(min_interval: Duration) -> Self {
        if min_interval.is_zero() {
            return Self::disabled();
        }
        debug!("creating rate limiter");
        Self {
            min_interval,
            disabled: false,
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a rate limiter from a requests-per-second ceiling.
    ///
    /// Zero, negative and non-finite values disable limiting.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use refcrawler_core::download::RateLimiter;
    ///
    /// assert_eq!(RateLimiter::from_rps(4.0).min_interval(), Duration::from_millis(250));
    /// assert!(RateLimiter::from_rps(0.0).is_disabled());
    /// ```
    #[must_use]
    pub fn from_rps(rps: f64) -> Self {
        if !rps.is_finite() || rps <= 0.0 {
            return Self::disabled();
        }
        Self::new(Duration::from_secs_f64(1.0 / rps))
    }

    /// Creates a disabled rate limiter that applies no delays.
    #[must_use]
    #[instrument]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            min_interval: Duration::ZERO,
            disabled: true,
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the minimum interval between requests.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Returns the total delay imposed on callers so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until the global minimum interval since the last request has
    /// elapsed, then records the current time as the last request.
    ///
    /// The first request proceeds immediately. Concurrent callers are
    /// serialized on the internal mutex, so `n` simultaneous callers finish
    /// no earlier than `(n - 1) * min_interval` after the first.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        if self.disabled {
            return;
        }

        let mut last_request_guard = self.last_request.lock().await;

        if let Some(last_request) = *last_request_guard {
            let elapsed = last_request.elapsed();

            if elapsed < self.min_interval {
                let delay = self.min_interval.saturating_sub(elapsed);
                let cumulative = self.add_cumulative_delay(delay);

                debug!(
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying rate limit delay"
                );

                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD
                    && cumulative.saturating_sub(delay) < CUMULATIVE_DELAY_WARNING_THRESHOLD
                {
                    warn!(
                        cumulative_delay_secs = cumulative.as_secs(),
                        "excessive rate limiting - consider raising --rps"
                    );
                }

                tokio::time::sleep(delay).await;
            }
        } else {
            debug!("first request - no delay");
        }

        *last_request_guard = Some(Instant::now());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use refcrawler_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(cap_retry_after(duration));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };

    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(cap_retry_after(duration)),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past");
            Some(Duration::ZERO)
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}
