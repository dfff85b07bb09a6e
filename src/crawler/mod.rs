//! Depth-bounded, level-synchronous citation crawler.
//!
//! Level 0 is the root set, stored under `main`. Each later level `d` is
//! built from the references returned by level `d - 1`, stored under
//! `ref{d}`. Every identifier in a level is submitted at once to a bounded
//! worker pool, and level `d + 1` is not computed until level `d` has fully
//! joined.
//!
//! # Concurrency Model
//!
//! - One Tokio task per identifier, gated by a semaphore of `workers` permits
//! - Results flow back through a [`JoinSet`]; only the coordinator touches
//!   the processed set and the next frontier
//! - A panicked task still counts as processed and is never retried
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refcrawler_core::crawler::{CrawlOptions, Crawler};
//! use refcrawler_core::metadata::MetadataOracle;
//! use refcrawler_core::parser::Doi;
//! use refcrawler_core::pipeline::DocumentProcessor;
//!
//! # async fn example(
//! #     processor: Arc<dyn DocumentProcessor>,
//! #     oracle: Arc<dyn MetadataOracle>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::new(processor, oracle, CrawlOptions::default());
//! let root = Doi::parse("10.1126/science.177.4047.393").ok_or("bad doi")?;
//! let report = crawler.crawl(&[root]).await;
//! println!("processed {} kept {}", report.processed, report.kept);
//! # Ok(())
//! # }
//! ```

mod observer;

pub use observer::{CrawlObserver, NoopObserver};

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::metadata::{CitationIndex, MetadataOracle, default_young_keywords};
use crate::parser::Doi;
use crate::pipeline::{DocumentProcessor, DownloadOutcome, OutcomeStatus};

/// Subdirectory for level 0.
pub const ROOT_SUBDIR: &str = "main";

/// Subdirectory for citation expansion.
pub const CITED_SUBDIR: &str = "cited";

/// Default maximum depth.
pub const DEFAULT_MAX_DEPTH: usize = 1;

/// Default worker-pool width.
pub const DEFAULT_WORKERS: usize = 4;

/// Default level gated by the young-author filter.
pub const DEFAULT_YOUNG_DEPTH: usize = 2;

/// Returns the storage subdirectory for `depth` (`main`, `ref1`, `ref2`, ...).
#[must_use]
pub fn level_subdir(depth: usize) -> String {
    if depth == 0 {
        ROOT_SUBDIR.to_string()
    } else {
        format!("ref{depth}")
    }
}

/// Admission gate for one crawl level.
///
/// Candidates entering level `target_depth` are admitted only if the oracle
/// reports an author affiliation containing one of `keywords`. A missing
/// record excludes the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoungFilter {
    /// Level whose admission is gated.
    pub target_depth: usize,
    /// Lowercase-insensitive affiliation tokens.
    pub keywords: Vec<String>,
}

impl Default for YoungFilter {
    fn default() -> Self {
        Self {
            target_depth: DEFAULT_YOUNG_DEPTH,
            keywords: default_young_keywords(),
        }
    }
}

/// Crawl parameters, fixed for the lifetime of a [`Crawler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Deepest level processed (inclusive).
    pub max_depth: usize,
    /// Worker-pool width (minimum 1).
    pub workers: usize,
    /// Optional admission gate.
    pub young_filter: Option<YoungFilter>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            young_filter: None,
        }
    }
}

/// Counters for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelReport {
    /// Level index.
    pub depth: usize,
    /// Storage subdirectory.
    pub subdir: String,
    /// Identifiers submitted.
    pub submitted: usize,
    /// Newly kept documents.
    pub kept: usize,
    /// History short-circuits.
    pub cache_hits: usize,
    /// Identifiers that ended without a file.
    pub failed: usize,
}

/// Summary of a crawl or citation expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Identifiers processed (each exactly once).
    pub processed: usize,
    /// Newly kept documents.
    pub kept: usize,
    /// History short-circuits.
    pub cache_hits: usize,
    /// Identifiers that ended without a file.
    pub failed: usize,
    /// Per-level counters, in level order.
    pub levels: Vec<LevelReport>,
    /// Candidates excluded by the young-author filter.
    pub filtered: usize,
}

impl CrawlReport {
    /// Adds `other`'s counters and levels to this report.
    pub fn merge(&mut self, other: CrawlReport) {
        self.processed += other.processed;
        self.kept += other.kept;
        self.cache_hits += other.cache_hits;
        self.failed += other.failed;
        self.filtered += other.filtered;
        self.levels.extend(other.levels);
    }

    fn record_level(&mut self, level: LevelReport) {
        self.processed += level.submitted;
        self.kept += level.kept;
        self.cache_hits += level.cache_hits;
        self.failed += level.failed;
        self.levels.push(level);
    }
}

/// Runs crawls and citation expansions over a shared [`DocumentProcessor`].
pub struct Crawler {
    processor: Arc<dyn DocumentProcessor>,
    oracle: Arc<dyn MetadataOracle>,
    options: CrawlOptions,
    semaphore: Arc<Semaphore>,
    observer: Arc<dyn CrawlObserver>,
}

impl Crawler {
    /// Creates a crawler. `options.workers` below 1 is treated as 1.
    #[must_use]
    pub fn new(
        processor: Arc<dyn DocumentProcessor>,
        oracle: Arc<dyn MetadataOracle>,
        options: CrawlOptions,
    ) -> Self {
        let workers = options.workers.max(1);
        Self {
            processor,
            oracle,
            options: CrawlOptions { workers, ..options },
            semaphore: Arc::new(Semaphore::new(workers)),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Installs a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the effective options.
    #[must_use]
    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawls from `roots` down to `max_depth`.
    ///
    /// Each identifier is processed at most once per call. Per-identifier
    /// failures never abort the crawl.
    #[instrument(skip(self, roots), fields(roots = roots.len(), max_depth = self.options.max_depth))]
    pub async fn crawl(&self, roots: &[Doi]) -> CrawlReport {
        let mut report = CrawlReport::default();
        let mut processed: HashSet<Doi> = HashSet::new();
        let mut frontier: BTreeSet<Doi> = roots.iter().cloned().collect();

        for depth in 0..=self.options.max_depth {
            let batch: Vec<Doi> = frontier
                .into_iter()
                .filter(|doi| !processed.contains(doi))
                .collect();
            if batch.is_empty() {
                debug!(depth, "frontier empty; crawl complete");
                break;
            }

            let subdir = level_subdir(depth);
            info!(depth, subdir = %subdir, size = batch.len(), "level started");
            self.observer.level_started(depth, &subdir, batch.len());

            let (level, outcomes) = self.run_batch(depth, &subdir, &batch).await;
            processed.extend(batch);
            info!(
                depth,
                kept = level.kept,
                cache_hits = level.cache_hits,
                failed = level.failed,
                "level complete"
            );
            report.record_level(level);

            if depth == self.options.max_depth {
                break;
            }

            let mut candidates: BTreeSet<Doi> = outcomes
                .into_iter()
                .flat_map(|outcome| outcome.references)
                .filter(|doi| !processed.contains(doi))
                .collect();

            let gate = self
                .options
                .young_filter
                .as_ref()
                .filter(|filter| filter.target_depth == depth + 1);
            if let Some(filter) = gate {
                let before = candidates.len();
                candidates = self.apply_young_filter(filter, candidates).await;
                let excluded = before - candidates.len();
                report.filtered += excluded;
                info!(
                    depth = depth + 1,
                    admitted = candidates.len(),
                    excluded,
                    "young-author filter applied"
                );
            }

            frontier = candidates;
        }

        info!(
            processed = report.processed,
            kept = report.kept,
            cache_hits = report.cache_hits,
            failed = report.failed,
            "crawl complete"
        );
        self.observer.crawl_finished(&report);
        report
    }

    /// Downloads the works citing `root` into `cited`.
    ///
    /// One level, no recursion, and no dedup against any crawl.
    #[instrument(skip(self, index), fields(root = %root, rows))]
    pub async fn expand_citations(
        &self,
        index: &dyn CitationIndex,
        root: &Doi,
        rows: usize,
    ) -> CrawlReport {
        let mut report = CrawlReport::default();
        let citing = index.citing(root, rows).await;
        info!(found = citing.len(), "citing works retrieved");

        if !citing.is_empty() {
            self.observer.level_started(0, CITED_SUBDIR, citing.len());
            let (level, _) = self.run_batch(0, CITED_SUBDIR, &citing).await;
            report.record_level(level);
        }

        self.observer.crawl_finished(&report);
        report
    }

    /// Processes `batch` concurrently and joins every task.
    async fn run_batch(
        &self,
        depth: usize,
        subdir: &str,
        batch: &[Doi],
    ) -> (LevelReport, Vec<DownloadOutcome>) {
        let mut tasks = JoinSet::new();
        for doi in batch {
            let processor = Arc::clone(&self.processor);
            let semaphore = Arc::clone(&self.semaphore);
            let doi = doi.clone();
            let subdir = subdir.to_string();
            tasks.spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(processor.process(&doi, &subdir).await)
            });
        }

        let mut level = LevelReport {
            depth,
            subdir: subdir.to_string(),
            submitted: batch.len(),
            kept: 0,
            cache_hits: 0,
            failed: 0,
        };
        let mut outcomes = Vec::with_capacity(batch.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => {
                    match outcome.status {
                        OutcomeStatus::Kept => level.kept += 1,
                        OutcomeStatus::CacheHit => level.cache_hits += 1,
                        _ => level.failed += 1,
                    }
                    debug!(doi = %outcome.identifier, status = ?outcome.status, "item finished");
                    self.observer.item_finished(&outcome);
                    outcomes.push(outcome);
                }
                Ok(None) => {
                    warn!(depth, "worker pool closed before task ran");
                    level.failed += 1;
                }
                Err(e) => {
                    // Ignore JoinError - task panics are logged but don't fail the level
                    warn!(depth, error = %e, "processing task panicked");
                    level.failed += 1;
                }
            }
        }

        (level, outcomes)
    }

    /// Keeps the candidates whose metadata shows a young author. Fail-closed.
    async fn apply_young_filter(
        &self,
        filter: &YoungFilter,
        candidates: BTreeSet<Doi>,
    ) -> BTreeSet<Doi> {
        let keywords = Arc::new(filter.keywords.clone());
        let mut tasks = JoinSet::new();
        for doi in candidates {
            let oracle = Arc::clone(&self.oracle);
            let semaphore = Arc::clone(&self.semaphore);
            let keywords = Arc::clone(&keywords);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (doi, false);
                };
                let admitted = oracle
                    .lookup(&doi)
                    .await
                    .is_some_and(|record| record.has_young_author(&keywords));
                (doi, admitted)
            });
        }

        let mut admitted = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((doi, true)) => {
                    debug!(doi = %doi, "young author found; admitted");
                    admitted.insert(doi);
                }
                Ok((doi, false)) => debug!(doi = %doi, "no young author; excluded"),
                Err(e) => warn!(error = %e, "affiliation check panicked; excluded"),
            }
        }
        admitted
    }
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
