//! Shared helpers for integration tests.
#![allow(dead_code)]

pub mod socket_guard;

use std::sync::Arc;
use std::time::Duration;

use refcrawler_core::download::{HttpClient, RateLimiter, RetryPolicy, TransportConfig};

/// Transport with no retries and no rate limit, for wiremock tests.
#[allow(clippy::unwrap_used)]
pub fn test_client() -> Arc<HttpClient> {
    let config = TransportConfig {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(0, 0.0),
    };
    Arc::new(HttpClient::new(config, Arc::new(RateLimiter::disabled())).unwrap())
}
