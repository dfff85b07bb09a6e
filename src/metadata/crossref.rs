//! Crossref-backed metadata oracle.
//!
//! Queries `{base}/works/{doi}` and keeps the answer in a bounded LRU memo
//! owned by the oracle. Misses are memoized too, so a DOI is requested at
//! most once per process unless it is evicted or two workers race on the
//! same first lookup.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{MetadataOracle, MetadataRecord};
use crate::download::{HttpClient, RequestKind};
use crate::parser::Doi;

/// Default Crossref API base URL.
const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

/// Default number of records kept in the memo.
pub const DEFAULT_MEMO_CAPACITY: usize = 1024;

// ==================== Crossref API Response Types ====================

/// Top-level Crossref API response.
#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

/// The `message` field from a `/works/{doi}` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CrossrefMessage {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    reference: Vec<CrossrefReference>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
}

/// One entry of `message.reference`; only some carry a DOI.
#[derive(Debug, Deserialize)]
struct CrossrefReference {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    #[serde(default)]
    affiliation: Vec<CrossrefAffiliation>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAffiliation {
    name: Option<String>,
}

/// `/works?query...` search response.
#[derive(Debug, Deserialize)]
struct CrossrefSearchResponse {
    message: CrossrefSearchMessage,
}

#[derive(Debug, Default, Deserialize)]
struct CrossrefSearchMessage {
    #[serde(default)]
    items: Vec<CrossrefItem>,
}

#[derive(Debug, Deserialize)]
struct CrossrefItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl CrossrefMessage {
    fn into_record(self) -> MetadataRecord {
        let title = self
            .title
            .into_iter()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|t| !t.is_empty());

        let mut references: Vec<Doi> = Vec::new();
        for doi in self
            .reference
            .into_iter()
            .filter_map(|r| r.doi)
            .filter_map(|raw| Doi::parse(&raw))
        {
            if !references.contains(&doi) {
                references.push(doi);
            }
        }

        let affiliations = self
            .author
            .into_iter()
            .flat_map(|a| a.affiliation)
            .filter_map(|a| a.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        MetadataRecord {
            title,
            references,
            affiliations,
        }
    }
}

// ==================== CrossrefOracle ====================

/// Metadata oracle backed by the Crossref REST API.
///
/// Construct once and share via `Arc`; the memo lives as long as the oracle.
pub struct CrossrefOracle {
    client: Arc<HttpClient>,
    base_url: String,
    memo: Mutex<LruCache<Doi, Option<MetadataRecord>>>,
}

impl CrossrefOracle {
    /// Creates an oracle against the public Crossref API.
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Creates an oracle with a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self::with_capacity(client, base_url, DEFAULT_MEMO_CAPACITY)
    }

    /// Creates an oracle whose memo holds at most `capacity` records (minimum 1).
    #[must_use]
    pub fn with_capacity(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of memoized entries, hits and misses alike.
    pub async fn memo_len(&self) -> usize {
        self.memo.lock().await.len()
    }

    /// Returns up to `rows` DOIs matching `query`, newest publication first.
    ///
    /// Errors are logged and produce an empty list.
    #[instrument(skip(self), fields(query = %query, rows))]
    pub async fn recent_works(&self, query: &str, rows: usize) -> Vec<Doi> {
        let url = format!("{}/works", self.base_url);
        let params = [
            ("query.bibliographic", query.to_string()),
            ("sort", "published".to_string()),
            ("order", "desc".to_string()),
            ("rows", rows.max(1).to_string()),
        ];

        let response = match self.client.get_with_query(&url, &params, RequestKind::Api).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "Crossref search rejected");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Crossref search failed");
                return Vec::new();
            }
        };

        match response.json::<CrossrefSearchResponse>().await {
            Ok(body) => {
                let mut dois: Vec<Doi> = Vec::new();
                for doi in body
                    .message
                    .items
                    .into_iter()
                    .filter_map(|item| item.doi)
                    .filter_map(|raw| Doi::parse(&raw))
                {
                    if !dois.contains(&doi) {
                        dois.push(doi);
                    }
                }
                debug!(found = dois.len(), "Crossref search complete");
                dois
            }
            Err(e) => {
                warn!(error = %e, "Crossref search payload unreadable");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, doi: &Doi) -> Option<MetadataRecord> {
        let url = format!("{}/works/{}", self.base_url, doi.encoded());
        debug!(api_url = %url, "Calling Crossref API");

        let response = match self.client.get(&url, RequestKind::Api).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Crossref API request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Crossref returned no record");
            return None;
        }

        match response.json::<CrossrefResponse>().await {
            Ok(body) => Some(body.message.into_record()),
            Err(e) => {
                warn!(error = %e, "Crossref payload unreadable");
                None
            }
        }
    }
}

impl std::fmt::Debug for CrossrefOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossrefOracle")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataOracle for CrossrefOracle {
    #[instrument(skip(self), fields(doi = %doi))]
    async fn lookup(&self, doi: &Doi) -> Option<MetadataRecord> {
        if let Some(cached) = self.memo.lock().await.get(doi) {
            debug!("metadata memo hit");
            return cached.clone();
        }

        // The memo lock is released while the request is in flight.
        let record = self.fetch(doi).await;
        self.memo.lock().await.put(doi.clone(), record.clone());
        record
    }
}
