//! Open-access index lookup (Unpaywall).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{ResolutionStrategy, ResolveError, StrategyStep};
use crate::download::{HttpClient, RequestKind};
use crate::parser::Doi;

/// Default Unpaywall API base URL.
pub const DEFAULT_UNPAYWALL_BASE_URL: &str = "https://api.unpaywall.org";

const NAME: &str = "open-access";

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    best_oa_location: Option<OaLocation>,
    #[serde(default)]
    oa_locations: Vec<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url_for_pdf: Option<String>,
    url: Option<String>,
}

impl OaLocation {
    fn document_url(&self) -> Option<Url> {
        [self.url_for_pdf.as_deref(), self.url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .find_map(|s| Url::parse(s).ok())
    }
}

impl UnpaywallResponse {
    fn document_url(&self) -> Option<Url> {
        self.best_oa_location
            .as_ref()
            .and_then(OaLocation::document_url)
            .or_else(|| self.oa_locations.iter().find_map(OaLocation::document_url))
    }
}

/// Queries Unpaywall for an open-access copy.
///
/// Skipped entirely when no contact email is configured.
pub struct OpenAccessStrategy {
    client: Arc<HttpClient>,
    base_url: String,
    email: Option<String>,
}

impl OpenAccessStrategy {
    /// Creates a strategy against the public Unpaywall API.
    #[must_use]
    pub fn new(client: Arc<HttpClient>, email: Option<String>) -> Self {
        Self::with_base_url(client, DEFAULT_UNPAYWALL_BASE_URL, email)
    }

    /// Creates a strategy with a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        }
    }
}

impl std::fmt::Debug for OpenAccessStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAccessStrategy")
            .field("base_url", &self.base_url)
            .field("email_configured", &self.email.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResolutionStrategy for OpenAccessStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip(self), fields(strategy = NAME, doi = %doi))]
    async fn attempt(&self, doi: &Doi) -> Result<StrategyStep, ResolveError> {
        let Some(email) = &self.email else {
            return Ok(StrategyStep::Skipped("no contact email configured".to_string()));
        };

        let url = format!("{}/v2/{}", self.base_url, doi);
        let response = self
            .client
            .get_with_query(&url, &[("email", email.clone())], RequestKind::Api)
            .await
            .map_err(|e| ResolveError::network(NAME, doi.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(StrategyStep::NotFound(format!(
                "index returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: UnpaywallResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::parse(NAME, doi.as_str(), e))?;

        match body.document_url() {
            Some(url) => {
                debug!(document = %url, "open-access location found");
                Ok(StrategyStep::Found(url))
            }
            None => Ok(StrategyStep::NotFound("no open-access location".to_string())),
        }
    }
}
