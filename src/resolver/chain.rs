//! Fixed-order strategy chain with short-circuit on the first hit.

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{ResolutionStrategy, StrategyStep};
use crate::parser::Doi;

/// How one strategy attempt ended without producing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Ran, found nothing.
    NotFound,
    /// Not applicable under the current configuration.
    Skipped,
    /// Returned an error.
    Failed,
    /// Returned a configuration error.
    Misconfigured,
}

/// Record of one strategy attempt that did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy name.
    pub strategy: String,
    /// Attempt result.
    pub outcome: AttemptOutcome,
    /// Human-readable detail.
    pub detail: String,
}

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// A candidate document URL.
    Document {
        /// Document URL.
        url: Url,
        /// Name of the strategy that produced it.
        strategy: String,
    },
    /// Every strategy was skipped or failed.
    NoSourceFound {
        /// One entry per strategy, in chain order.
        attempts: Vec<StrategyAttempt>,
    },
}

/// Ordered list of strategies.
///
/// Strategies are tried in insertion order; the first `Found` wins and later
/// strategies are not consulted. Strategy errors are logged and recorded,
/// never propagated.
pub struct ResolutionChain {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl ResolutionChain {
    /// Creates a chain over `strategies` in the given order.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the strategy names in chain order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs the chain for `doi`.
    #[instrument(skip(self), fields(doi = %doi))]
    pub async fn resolve(&self, doi: &Doi) -> ResolutionResult {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let name = strategy.name();
            debug!(strategy = name, "trying strategy");

            let (outcome, detail) = match strategy.attempt(doi).await {
                Ok(StrategyStep::Found(url)) => {
                    info!(strategy = name, url = %url, "document source found");
                    return ResolutionResult::Document {
                        url,
                        strategy: name.to_string(),
                    };
                }
                Ok(StrategyStep::NotFound(reason)) => {
                    debug!(strategy = name, %reason, "strategy found nothing");
                    (AttemptOutcome::NotFound, reason)
                }
                Ok(StrategyStep::Skipped(reason)) => {
                    debug!(strategy = name, %reason, "strategy skipped");
                    (AttemptOutcome::Skipped, reason)
                }
                Err(err) if err.is_configuration() => {
                    warn!(strategy = name, error = %err, "strategy misconfigured");
                    (AttemptOutcome::Misconfigured, err.to_string())
                }
                Err(err) => {
                    warn!(strategy = name, error = %err, "strategy failed, trying next");
                    (AttemptOutcome::Failed, err.to_string())
                }
            };
            attempts.push(StrategyAttempt {
                strategy: name.to_string(),
                outcome,
                detail,
            });
        }

        info!(tried = attempts.len(), "no document source found");
        ResolutionResult::NoSourceFound { attempts }
    }
}

impl std::fmt::Debug for ResolutionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionChain")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
