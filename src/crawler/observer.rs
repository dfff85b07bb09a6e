//! Crawl progress hooks.

use crate::pipeline::DownloadOutcome;

use super::CrawlReport;

/// Receives progress events from the coordinator.
///
/// All methods are called from the coordinating task, never from workers,
/// and default to no-ops.
pub trait CrawlObserver: Send + Sync {
    /// A level's batch is about to be submitted.
    fn level_started(&self, _depth: usize, _subdir: &str, _batch_size: usize) {}

    /// One identifier finished processing.
    fn item_finished(&self, _outcome: &DownloadOutcome) {}

    /// The crawl (or citation expansion) ended.
    fn crawl_finished(&self, _report: &CrawlReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}
