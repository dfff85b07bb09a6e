//! Citing-paper lookups ("who cites this DOI?").

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::download::{HttpClient, RequestKind};
use crate::parser::Doi;

/// Default Semantic Scholar Graph API base URL.
const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

/// Largest page the citations endpoint accepts.
const MAX_ROWS: usize = 200;

/// Source of works that cite a given DOI.
#[async_trait]
pub trait CitationIndex: Send + Sync {
    /// Returns up to `rows` DOIs of works citing `doi`. Failures yield an empty list.
    async fn citing(&self, doi: &Doi, rows: usize) -> Vec<Doi>;
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    #[serde(default)]
    data: Vec<CitationEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitationEdge {
    citing_paper: Option<CitingPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CitingPaper {
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl CitationsResponse {
    fn into_dois(self) -> Vec<Doi> {
        let mut out: Vec<Doi> = Vec::new();
        for doi in self
            .data
            .into_iter()
            .filter_map(|edge| edge.citing_paper)
            .filter_map(|paper| paper.external_ids)
            .filter_map(|ids| ids.doi)
            .filter_map(|raw| Doi::parse(&raw))
        {
            if !out.contains(&doi) {
                out.push(doi);
            }
        }
        out
    }
}

/// [`CitationIndex`] backed by the Semantic Scholar Graph API.
pub struct SemanticScholarIndex {
    client: Arc<HttpClient>,
    base_url: String,
}

impl SemanticScholarIndex {
    /// Creates an index against the public Semantic Scholar API.
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Creates an index with a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl std::fmt::Debug for SemanticScholarIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScholarIndex")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CitationIndex for SemanticScholarIndex {
    #[instrument(skip(self), fields(doi = %doi, rows))]
    async fn citing(&self, doi: &Doi, rows: usize) -> Vec<Doi> {
        let url = format!("{}/graph/v1/paper/DOI:{}/citations", self.base_url, doi);
        let params = [
            ("fields", "externalIds".to_string()),
            ("limit", rows.clamp(1, MAX_ROWS).to_string()),
            ("offset", "0".to_string()),
        ];

        let response = match self.client.get_with_query(&url, &params, RequestKind::Api).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "citation index rejected request");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "citation index request failed");
                return Vec::new();
            }
        };

        match response.json::<CitationsResponse>().await {
            Ok(body) => {
                let dois = body.into_dois();
                debug!(found = dois.len(), "citing works retrieved");
                dois
            }
            Err(e) => {
                warn!(error = %e, "citation index payload unreadable");
                Vec::new()
            }
        }
    }
}
