//! Publisher landing-page scrape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::utils::find_document_link;
use super::{ResolutionStrategy, ResolveError, StrategyStep};
use crate::download::{HttpClient, RequestKind};
use crate::parser::Doi;

/// Default DOI resolver host.
pub const DEFAULT_DOI_BASE_URL: &str = "https://doi.org";

const NAME: &str = "publisher";

/// Follows the DOI to its landing page and looks for a document link.
pub struct PublisherStrategy {
    client: Arc<HttpClient>,
    doi_base: String,
}

impl PublisherStrategy {
    /// Creates a strategy resolving through `https://doi.org`.
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_DOI_BASE_URL)
    }

    /// Creates a strategy resolving through a custom DOI host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Arc<HttpClient>, doi_base: impl Into<String>) -> Self {
        Self {
            client,
            doi_base: doi_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl std::fmt::Debug for PublisherStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherStrategy")
            .field("doi_base", &self.doi_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResolutionStrategy for PublisherStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self), fields(strategy = NAME, doi = %doi))]
    async fn attempt(&self, doi: &Doi) -> Result<StrategyStep, ResolveError> {
        let landing = format!("{}/{}", self.doi_base, doi);
        let response = self
            .client
            .get(&landing, RequestKind::Publisher)
            .await
            .map_err(|e| ResolveError::network(NAME, doi.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(StrategyStep::NotFound(format!(
                "landing page returned HTTP {}",
                status.as_u16()
            )));
        }

        let final_url: Url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ResolveError::parse(NAME, doi.as_str(), e))?;

        match find_document_link(&html, &final_url) {
            Some(url) => {
                debug!(landing = %final_url, document = %url, "document link found");
                Ok(StrategyStep::Found(url))
            }
            None => Ok(StrategyStep::NotFound(format!(
                "no document link on {final_url}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::{RateLimiter, RetryPolicy, TransportConfig};
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn client() -> Arc<HttpClient> {
        let config = TransportConfig {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(0, 0.0),
        };
        Arc::new(HttpClient::new(config, Arc::new(RateLimiter::disabled())).unwrap())
    }

    #[tokio::test]
    async fn test_publisher_resolves_relative_link_against_final_url() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let article = format!("{}/journal/article/77", mock_server.uri());
        Mock::given(method("GET"))
            .and(path("/10.1234/abc"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", article.as_str()))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/journal/article/77"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<html><a href="files/77.pdf">Download</a></html>"#),
            )
            .mount(&mock_server)
            .await;

        let strategy = PublisherStrategy::with_base_url(client(), mock_server.uri());
        let step = strategy
            .attempt(&Doi::parse("10.1234/abc").unwrap())
            .await
            .unwrap();
        let StrategyStep::Found(url) = step else {
            panic!("expected Found, got {step:?}");
        };
        assert_eq!(url.as_str(), format!("{}/journal/article/files/77.pdf", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_publisher_no_link_is_not_found() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/10.1234/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<a href='/about'>About</a>"))
            .mount(&mock_server)
            .await;

        let strategy = PublisherStrategy::with_base_url(client(), mock_server.uri());
        let step = strategy
            .attempt(&Doi::parse("10.1234/abc").unwrap())
            .await
            .unwrap();
        assert!(matches!(step, StrategyStep::NotFound(_)));
    }

    #[tokio::test]
    async fn test_publisher_error_status_is_not_found() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let strategy = PublisherStrategy::with_base_url(client(), mock_server.uri());
        let step = strategy
            .attempt(&Doi::parse("10.1234/abc").unwrap())
            .await
            .unwrap();
        let StrategyStep::NotFound(reason) = step else {
            panic!("expected NotFound");
        };
        assert!(reason.contains("403"));
    }

    #[tokio::test]
    async fn test_publisher_unreachable_is_network_error() {
        let strategy = PublisherStrategy::with_base_url(client(), "http://127.0.0.1:1");
        let err = strategy
            .attempt(&Doi::parse("10.1234/abc").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Network { .. }));
    }
}
