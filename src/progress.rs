//! Progress bar for production runs.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use refcrawler_core::crawler::{CrawlObserver, CrawlReport};
use refcrawler_core::pipeline::{DownloadOutcome, OutcomeStatus};

const BAR_TEMPLATE: &str = "{spinner} {prefix:>6} [{bar:30}] {pos}/{len} {msg}";

/// Draws one bar per crawl level on stderr.
pub(crate) struct ProgressObserver {
    bar: Mutex<Option<ProgressBar>>,
    visible: bool,
}

impl ProgressObserver {
    /// Creates an observer; `visible = false` keeps every bar hidden.
    pub(crate) fn new(visible: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            visible,
        }
    }

    fn new_bar(&self, len: u64) -> ProgressBar {
        let bar = if self.visible {
            ProgressBar::new(len)
        } else {
            ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden())
        };
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    #[cfg(test)]
    fn position(&self) -> Option<u64> {
        self.bar
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(ProgressBar::position))
    }
}

impl CrawlObserver for ProgressObserver {
    fn level_started(&self, _depth: usize, subdir: &str, batch_size: usize) {
        let bar = self.new_bar(u64::try_from(batch_size).unwrap_or(u64::MAX));
        bar.set_prefix(subdir.to_string());
        if let Ok(mut guard) = self.bar.lock()
            && let Some(previous) = guard.replace(bar)
        {
            previous.finish();
        }
    }

    fn item_finished(&self, outcome: &DownloadOutcome) {
        let Ok(guard) = self.bar.lock() else {
            return;
        };
        if let Some(bar) = guard.as_ref() {
            let label = match outcome.status {
                OutcomeStatus::Kept => "kept",
                OutcomeStatus::CacheHit => "cached",
                _ => "skipped",
            };
            bar.set_message(format!("{label} {}", outcome.identifier));
            bar.inc(1);
        }
    }

    fn crawl_finished(&self, report: &CrawlReport) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_with_message(format!(
                "kept {} cached {} failed {}",
                report.kept, report.cache_hits, report.failed
            ));
        }
    }
}
