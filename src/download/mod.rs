//! Rate-limited HTTP transport and PDF download.
//!
//! # Features
//!
//! - One process-wide [`RateLimiter`] shared by every outbound request
//! - Bounded retries with exponential backoff ([`RetryPolicy`])
//! - Per-purpose timeouts ([`RequestKind`]): 15s API, 20s publisher page,
//!   10s mirror page, 60s document
//! - PDF type check by `Content-Type` or `%PDF` magic before anything is written
//! - Streaming writes with partial-file cleanup
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use refcrawler_core::download::{HttpClient, RateLimiter, TransportConfig, document_path};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(TransportConfig::default(), Arc::new(RateLimiter::disabled()))?;
//! let target = document_path(Path::new("Downloads_pdf/sample/main"), "Some Paper Title");
//! let saved = client.fetch_document("https://example.com/paper.pdf", &target).await?;
//! println!("Downloaded: {}", saved.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;
mod rate_limiter;
mod retry;

pub use client::{HttpClient, RequestKind, TransportConfig};
pub use error::DownloadError;
pub use filename::{document_path, partial_path, sanitize_title, unique_document_path};
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_STATUSES, FailureType,
    RetryDecision, RetryPolicy,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
