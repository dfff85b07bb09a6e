//! Resolution strategy chain: DOI to candidate document URL.
//!
//! # Architecture
//!
//! - [`ResolutionStrategy`] - Async trait each source implements
//! - [`ResolutionChain`] - Fixed-order list, short-circuits on the first hit
//! - [`PublisherStrategy`] - Landing-page scrape via `doi.org`
//! - [`OpenAccessStrategy`] - Unpaywall lookup, skipped without a contact email
//! - [`MirrorStrategy`] - Operator-supplied mirrors, no built-in hosts
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refcrawler_core::download::{HttpClient, RateLimiter, TransportConfig};
//! use refcrawler_core::parser::Doi;
//! use refcrawler_core::resolver::{build_default_chain, ResolutionResult};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new(TransportConfig::default(), Arc::new(RateLimiter::disabled()))?);
//! let chain = build_default_chain(&client, Some("me@example.org".into()), vec![]);
//! let doi = Doi::parse("10.1126/science.177.4047.393").ok_or("bad doi")?;
//! if let ResolutionResult::Document { url, strategy } = chain.resolve(&doi).await {
//!     println!("{strategy}: {url}");
//! }
//! # Ok(())
//! # }
//! ```

mod chain;
mod error;
mod mirror;
mod open_access;
mod publisher;
mod utils;

pub use chain::{AttemptOutcome, ResolutionChain, ResolutionResult, StrategyAttempt};
pub use error::ResolveError;
pub use mirror::{MirrorStrategy, find_embedded_document};
pub use open_access::{DEFAULT_UNPAYWALL_BASE_URL, OpenAccessStrategy};
pub use publisher::{DEFAULT_DOI_BASE_URL, PublisherStrategy};
pub use utils::{absolutize_url, find_document_link};

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::download::HttpClient;
use crate::parser::Doi;

/// Builds the standard chain: publisher, then open access, then mirrors.
#[must_use]
pub fn build_default_chain(
    client: &Arc<HttpClient>,
    unpaywall_email: Option<String>,
    mirrors: Vec<String>,
) -> ResolutionChain {
    ResolutionChain::new(vec![
        Box::new(PublisherStrategy::new(Arc::clone(client))),
        Box::new(OpenAccessStrategy::new(Arc::clone(client), unpaywall_email)),
        Box::new(MirrorStrategy::new(Arc::clone(client), mirrors)),
    ])
}

/// Result of a single strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyStep {
    /// Candidate document URL.
    Found(Url),
    /// The strategy ran and found nothing.
    NotFound(String),
    /// The strategy does not apply under the current configuration.
    Skipped(String),
}

/// One way of locating a document for a DOI.
///
/// Strategies are stateless apart from their configuration and are shared
/// across workers, so they must be `Send + Sync`.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Returns the strategy's name (e.g., "publisher", "open-access", "mirror").
    fn name(&self) -> &str;

    /// Attempts to locate a document for `doi`.
    async fn attempt(&self, doi: &Doi) -> Result<StrategyStep, ResolveError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::{RateLimiter, TransportConfig};

    #[test]
    fn test_default_chain_order() {
        let client = Arc::new(
            HttpClient::new(TransportConfig::default(), Arc::new(RateLimiter::disabled())).unwrap(),
        );
        let chain = build_default_chain(&client, None, vec![]);
        assert_eq!(chain.strategy_names(), vec!["publisher", "open-access", "mirror"]);
    }
}
