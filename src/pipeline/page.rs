//! Source-page inspection: candidate title and scraped references.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::download::{HttpClient, RequestKind};
use crate::parser::{Doi, extract_references, extract_title};
use crate::resolver::DEFAULT_DOI_BASE_URL;

/// What a source page says about a work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// `<title>` of the first page that had one.
    pub title: Option<String>,
    /// DOIs referenced on the pages that were read.
    pub references: HashSet<Doi>,
}

/// Reads a work's source page. Never fails; unreachable pages yield empty info.
#[async_trait]
pub trait PageInspector: Send + Sync {
    /// Inspects the pages for `doi`.
    async fn inspect(&self, doi: &Doi) -> PageInfo;
}

/// Reads the DOI landing page, then each mirror page until a title is found.
pub struct LandingPageInspector {
    client: Arc<HttpClient>,
    doi_base: String,
    mirrors: Vec<String>,
}

impl LandingPageInspector {
    /// Creates an inspector resolving through `https://doi.org`.
    #[must_use]
    pub fn new(client: Arc<HttpClient>, mirrors: Vec<String>) -> Self {
        Self::with_base_url(client, DEFAULT_DOI_BASE_URL, mirrors)
    }

    /// Creates an inspector with a custom DOI host (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        client: Arc<HttpClient>,
        doi_base: impl Into<String>,
        mirrors: Vec<String>,
    ) -> Self {
        Self {
            client,
            doi_base: doi_base.into().trim_end_matches('/').to_string(),
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim().trim_end_matches('/').to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Fetches one page and scrapes it; `None` for anything but HTTP 200.
    async fn read_page(&self, url: &str, kind: RequestKind, doi: &Doi) -> Option<PageInfo> {
        let response = match self.client.get(url, kind).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "source page unreachable");
                return None;
            }
        };
        if response.status().as_u16() != 200 {
            debug!(url, status = response.status().as_u16(), "source page unavailable");
            return None;
        }
        let html = response.text().await.ok()?;
        Some(PageInfo {
            title: extract_title(&html),
            references: extract_references(&html, Some(doi)),
        })
    }
}

impl std::fmt::Debug for LandingPageInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandingPageInspector")
            .field("doi_base", &self.doi_base)
            .field("mirrors", &self.mirrors)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PageInspector for LandingPageInspector {
    #[instrument(skip(self), fields(doi = %doi))]
    async fn inspect(&self, doi: &Doi) -> PageInfo {
        let mut references = HashSet::new();

        let landing = format!("{}/{}", self.doi_base, doi);
        if let Some(info) = self.read_page(&landing, RequestKind::Publisher, doi).await {
            references.extend(info.references);
            if info.title.is_some() {
                debug!(title = ?info.title, refs = references.len(), "landing page inspected");
                return PageInfo {
                    title: info.title,
                    references,
                };
            }
        }

        for mirror in &self.mirrors {
            let page = format!("{mirror}/{doi}");
            if let Some(info) = self.read_page(&page, RequestKind::Mirror, doi).await {
                references.extend(info.references);
                if info.title.is_some() {
                    debug!(mirror = %mirror, title = ?info.title, "title taken from mirror page");
                    return PageInfo {
                        title: info.title,
                        references,
                    };
                }
            }
        }

        debug!(refs = references.len(), "no page title found");
        PageInfo {
            title: None,
            references,
        }
    }
}
