//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use refcrawler_core::crawler::{DEFAULT_MAX_DEPTH, DEFAULT_YOUNG_DEPTH};
use refcrawler_core::config::DEFAULT_RECENT_ROWS;

/// Default citation-expansion page size.
pub const DEFAULT_CITED_ROWS: usize = 10;

/// Crawl a DOI's citation graph and keep verified PDFs.
///
/// Starting from one or more DOIs, refcrawler downloads each work, verifies
/// it against its registered title, and follows its references level by
/// level. Without --doi it runs a production crawl of a built-in sample DOI.
#[derive(Parser, Debug)]
#[command(name = "refcrawler")]
#[command(author, version, about)]
pub struct Args {
    /// DOI(s) to crawl; comma or space separated
    #[arg(long)]
    pub doi: Option<String>,

    /// Deepest reference level to crawl (0 = roots only)
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: usize,

    /// Concurrent downloads per level (1-64) [default: 4]
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub workers: Option<u8>,

    /// Only admit works with a young author into the target level
    #[arg(long)]
    pub young: bool,

    /// Level gated by --young
    #[arg(long, default_value_t = DEFAULT_YOUNG_DEPTH)]
    pub young_depth: usize,

    /// Comma-separated affiliation keywords for --young (replaces the defaults)
    #[arg(long)]
    pub young_keywords: Option<String>,

    /// Global request rate in requests per second (0 = unlimited)
    #[arg(long)]
    pub rps: Option<f64>,

    /// HTTP retries after the first attempt (0-10) [default: 3]
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retries: Option<u32>,

    /// HTTP retry backoff factor in seconds [default: 0.5]
    #[arg(long)]
    pub backoff: Option<f64>,

    /// Metadata API timeout in seconds [default: 15]
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Contact email for the Unpaywall open-access lookup
    #[arg(long)]
    pub unpaywall_email: Option<String>,

    /// Comma-separated mirror base URLs, tried in order
    #[arg(long)]
    pub mirrors: Option<String>,

    /// Also download works that cite each root DOI
    #[arg(long)]
    pub cited: bool,

    /// Maximum citing works per root for --cited (1-200)
    #[arg(long, default_value_t = DEFAULT_CITED_ROWS)]
    pub cited_rows: usize,

    /// Add the newest works matching this search query as roots
    #[arg(long, value_name = "QUERY")]
    pub recent: Option<String>,

    /// Number of works added by --recent
    #[arg(long, default_value_t = DEFAULT_RECENT_ROWS)]
    pub recent_rows: usize,

    /// Storage root for PDFs and the history file [default: Downloads_pdf/sample]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/refcrawler/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Production mode: progress bar and summaries only
    #[arg(long)]
    pub prod: bool,

    /// Increase output verbosity (-v for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// True when no roots were given; the built-in sample crawl runs instead.
    #[must_use]
    pub fn is_sample_run(&self) -> bool {
        self.doi.is_none() && self.recent.is_none()
    }
}

/// Splits a comma-separated flag value into trimmed, non-empty entries.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
