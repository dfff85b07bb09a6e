//! Download-and-verify pipeline for a single DOI.
//!
//! [`DocumentPipeline::process`] runs these steps in order:
//!
//! 1. History short-circuit (record exists and its file is still on disk)
//! 2. Authoritative title from the [`MetadataOracle`]; none means no download
//! 3. Page inspection for a candidate title and scraped references
//! 4. Resolution chain for a document URL
//! 5. Fetch with document type check (nothing written for non-documents)
//! 6. Store in a per-DOI partial file under `{output_root}/{subdir}`
//! 7. Fuzzy title verification (>= 0.80)
//! 8. Rejected partial files are deleted, no history write
//! 9. Kept files are renamed to `{sanitized title}.pdf` and get a history
//!    record. A name already held by another DOI gets a ` [doi]` suffix, so
//!    a kept file is never overwritten or deleted on behalf of another DOI.
//!
//! Every path returns the references known so far, so the crawl can go on
//! whether or not a file was kept.

mod page;
mod verify;

pub use page::{LandingPageInspector, PageInfo, PageInspector};
pub use verify::{TITLE_MATCH_THRESHOLD, title_similarity, titles_match};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    DownloadError, HttpClient, document_path, partial_path, unique_document_path,
};
use crate::history::{HistoryRecord, HistoryStore};
use crate::metadata::MetadataOracle;
use crate::parser::Doi;
use crate::resolver::{ResolutionChain, ResolutionResult};

/// Default storage root for documents and the history file.
pub const DEFAULT_OUTPUT_ROOT: &str = "Downloads_pdf/sample";

/// How processing one DOI ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// History record with an existing file; nothing fetched.
    CacheHit,
    /// Downloaded, verified and recorded.
    Kept,
    /// Downloaded but the title did not match; file deleted.
    Rejected,
    /// No strategy produced a URL.
    NoSourceFound,
    /// The URL served something other than a document.
    NotDocument,
    /// Transport or storage failure during the fetch.
    FetchFailed,
    /// The oracle had no title for this DOI.
    NoAuthoritativeTitle,
}

impl OutcomeStatus {
    /// Returns true if a verified file exists for the DOI after processing.
    #[must_use]
    pub fn has_file(self) -> bool {
        matches!(self, Self::CacheHit | Self::Kept)
    }
}

/// Result of processing one DOI.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    /// The DOI processed.
    pub identifier: Doi,
    /// True if a verified file exists for it.
    pub kept: bool,
    /// Path of the verified file, if kept.
    pub stored_path: Option<PathBuf>,
    /// References discovered for this work.
    pub references: HashSet<Doi>,
    /// When processing finished.
    pub timestamp: DateTime<Utc>,
    /// How processing ended.
    pub status: OutcomeStatus,
}

impl DownloadOutcome {
    /// Builds an outcome stamped with the current time.
    #[must_use]
    pub fn new(
        identifier: Doi,
        status: OutcomeStatus,
        stored_path: Option<PathBuf>,
        references: HashSet<Doi>,
    ) -> Self {
        Self {
            identifier,
            kept: status.has_file(),
            stored_path,
            references,
            timestamp: Utc::now(),
            status,
        }
    }
}

/// Processes one DOI into a stored document (maybe) and its references.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Processes `doi`, storing any document under `subdir`. Never fails.
    async fn process(&self, doi: &Doi, subdir: &str) -> DownloadOutcome;
}

/// The production [`DocumentProcessor`].
pub struct DocumentPipeline {
    client: Arc<HttpClient>,
    oracle: Arc<dyn MetadataOracle>,
    inspector: Arc<dyn PageInspector>,
    chain: Arc<ResolutionChain>,
    history: Arc<HistoryStore>,
    output_root: PathBuf,
    // Final paths handed out this run, so concurrent same-title keeps differ.
    claims: Mutex<HashMap<PathBuf, Doi>>,
}

impl DocumentPipeline {
    /// Wires a pipeline from shared components.
    #[must_use]
    pub fn new(
        client: Arc<HttpClient>,
        oracle: Arc<dyn MetadataOracle>,
        inspector: Arc<dyn PageInspector>,
        chain: Arc<ResolutionChain>,
        history: Arc<HistoryStore>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            oracle,
            inspector,
            chain,
            history,
            output_root: output_root.into(),
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the storage root.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Picks the final file name for a verified document.
    ///
    /// The plain title name is used unless a history record or an earlier
    /// keep in this run already holds it for a different DOI.
    async fn claim_path(&self, dir: &Path, doi: &Doi, title: &str) -> PathBuf {
        let plain = document_path(dir, title);
        let recorded_holder = self.history.holder_of(&plain).await;

        let mut claims = self.claims.lock().await;
        let free = recorded_holder.as_ref().is_none_or(|holder| holder == doi)
            && claims.get(&plain).is_none_or(|holder| holder == doi);
        let chosen = if free {
            plain
        } else {
            let unique = unique_document_path(dir, title, doi.as_str());
            debug!(path = %unique.display(), "title name taken by another DOI");
            unique
        };
        claims.insert(chosen.clone(), doi.clone());
        chosen
    }
}

impl std::fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("output_root", &self.output_root)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DocumentProcessor for DocumentPipeline {
    #[instrument(skip(self), fields(doi = %doi, subdir))]
    async fn process(&self, doi: &Doi, subdir: &str) -> DownloadOutcome {
        if let Some(record) = self.history.get(doi).await {
            if record.file_exists() {
                info!(path = %record.path.display(), "cache hit");
                let references = record.references.iter().cloned().collect();
                return DownloadOutcome::new(
                    doi.clone(),
                    OutcomeStatus::CacheHit,
                    Some(record.path),
                    references,
                );
            }
            debug!(path = %record.path.display(), "history record stale; file missing");
        }

        let metadata = self.oracle.lookup(doi).await;
        let mut references: HashSet<Doi> = metadata
            .as_ref()
            .map(|m| m.references.iter().cloned().collect())
            .unwrap_or_default();
        let Some(official_title) = metadata.and_then(|m| m.title) else {
            info!("no authoritative title; skipping download");
            return DownloadOutcome::new(
                doi.clone(),
                OutcomeStatus::NoAuthoritativeTitle,
                None,
                references,
            );
        };
        debug!(title = %official_title, "authoritative title");

        let page = self.inspector.inspect(doi).await;
        references.extend(page.references);

        let url = match self.chain.resolve(doi).await {
            ResolutionResult::Document { url, strategy } => {
                debug!(url = %url, strategy, "document source");
                url
            }
            ResolutionResult::NoSourceFound { attempts } => {
                info!(attempts = attempts.len(), "no document source; keeping references only");
                return DownloadOutcome::new(
                    doi.clone(),
                    OutcomeStatus::NoSourceFound,
                    None,
                    references,
                );
            }
        };

        let dir = self.output_root.join(subdir);
        let partial = partial_path(&dir, doi.as_str());
        let fetched = match self.client.fetch_document(url.as_str(), &partial).await {
            Ok(path) => path,
            Err(DownloadError::NotDocument { content_type, .. }) => {
                info!(url = %url, %content_type, "source is not a document; discarded");
                return DownloadOutcome::new(
                    doi.clone(),
                    OutcomeStatus::NotDocument,
                    None,
                    references,
                );
            }
            Err(e) => {
                warn!(url = %url, error = %e, "document fetch failed");
                return DownloadOutcome::new(
                    doi.clone(),
                    OutcomeStatus::FetchFailed,
                    None,
                    references,
                );
            }
        };

        if !titles_match(Some(&official_title), page.title.as_deref()) {
            info!(
                official = %official_title,
                page = ?page.title,
                path = %fetched.display(),
                "title verification failed; deleting file"
            );
            if let Err(e) = tokio::fs::remove_file(&fetched).await {
                warn!(path = %fetched.display(), error = %e, "could not delete rejected file");
            }
            return DownloadOutcome::new(doi.clone(), OutcomeStatus::Rejected, None, references);
        }

        let stored = self.claim_path(&dir, doi, &official_title).await;
        if let Err(e) = tokio::fs::rename(&fetched, &stored).await {
            warn!(path = %stored.display(), error = %e, "could not move verified file into place");
            if let Err(e) = tokio::fs::remove_file(&fetched).await {
                warn!(path = %fetched.display(), error = %e, "could not delete partial file");
            }
            return DownloadOutcome::new(
                doi.clone(),
                OutcomeStatus::FetchFailed,
                None,
                references,
            );
        }

        let mut recorded: Vec<Doi> = references.iter().cloned().collect();
        recorded.sort();
        self.history
            .put(
                doi,
                HistoryRecord {
                    title: official_title,
                    path: stored.clone(),
                    subdir: subdir.to_string(),
                    references: recorded,
                    ts: Utc::now(),
                },
            )
            .await;
        info!(path = %stored.display(), "document kept");
        DownloadOutcome::new(doi.clone(), OutcomeStatus::Kept, Some(stored), references)
    }
}
