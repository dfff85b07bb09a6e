//! CLI entry point for the refcrawler tool.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use refcrawler_core::crawler::{CrawlReport, Crawler};
use refcrawler_core::download::HttpClient;
use refcrawler_core::history::HistoryStore;
use refcrawler_core::metadata::{CrossrefOracle, MetadataOracle, SemanticScholarIndex};
use refcrawler_core::pipeline::{
    DocumentPipeline, DocumentProcessor, LandingPageInspector, PageInspector,
};
use refcrawler_core::resolver::build_default_chain;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod config_runtime;
mod progress;

use cli::Args;
use config_runtime::build_run_plan;
use progress::ProgressObserver;

/// Log filter for production runs: crawl summaries only.
const PROD_LOG_FILTER: &str = "warn,refcrawler=info";

/// Log filter for interactive runs: per-item crawl detail.
const DEBUG_LOG_FILTER: &str = "info,refcrawler=debug";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > prod > default
    let prod = args.prod || args.is_sample_run();
    let default_level = if args.quiet {
        "error"
    } else if args.verbose > 0 {
        "trace"
    } else if prod {
        PROD_LOG_FILTER
    } else {
        DEBUG_LOG_FILTER
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_config(args.config.as_deref())?;
    if loaded.loaded_from_file
        && let Some(path) = &loaded.path
    {
        info!(path = %path.display(), "loaded config file");
    }

    let plan = build_run_plan(&args, loaded.config.as_ref())?;
    let config = plan.config;
    config.validate()?;
    if !plan.skipped.is_empty() {
        warn!(skipped = plan.skipped.len(), "some identifiers were not valid DOIs");
    }
    if config.mirrors.is_empty() {
        warn!("no mirrors configured; mirror resolution will be skipped");
    }

    info!(
        roots = config.roots.len(),
        max_depth = config.max_depth,
        workers = config.workers,
        rps = config.rps,
        young_filter = config.young_filter.is_some(),
        output = %config.output_root.display(),
        "refcrawler starting"
    );

    let client = Arc::new(HttpClient::new(
        config.transport_config(),
        config.rate_limiter(),
    )?);
    let crossref = Arc::new(CrossrefOracle::new(Arc::clone(&client)));
    let oracle: Arc<dyn MetadataOracle> = crossref.clone();
    let inspector: Arc<dyn PageInspector> = Arc::new(LandingPageInspector::new(
        Arc::clone(&client),
        config.mirrors.clone(),
    ));
    let chain = Arc::new(build_default_chain(
        &client,
        config.unpaywall_email.clone(),
        config.mirrors.clone(),
    ));
    let history = Arc::new(HistoryStore::in_output_root(&config.output_root));
    let pipeline: Arc<dyn DocumentProcessor> = Arc::new(DocumentPipeline::new(
        Arc::clone(&client),
        Arc::clone(&oracle),
        inspector,
        chain,
        history,
        config.output_root.clone(),
    ));

    let mut crawler = Crawler::new(pipeline, oracle, config.crawl_options());
    if plan.prod && !args.quiet {
        crawler = crawler.with_observer(Arc::new(ProgressObserver::new(
            io::stderr().is_terminal(),
        )));
    }

    let mut roots = config.roots.clone();
    if let Some(query) = &config.recent_query {
        let recent = crossref.recent_works(query, config.recent_rows).await;
        info!(query = %query, found = recent.len(), "recent works added as roots");
        for doi in recent {
            if !roots.contains(&doi) {
                roots.push(doi);
            }
        }
    }
    if roots.is_empty() {
        warn!("nothing to crawl");
        return Ok(());
    }

    let citations = config
        .cited_rows
        .map(|rows| (SemanticScholarIndex::new(Arc::clone(&client)), rows));

    // Each root is crawled on its own; a DOI reachable from two roots is
    // visited twice, and the history file turns the second visit into a hit.
    let mut total = CrawlReport::default();
    for root in &roots {
        info!(root = %root, "crawling root");
        let report = crawler.crawl(std::slice::from_ref(root)).await;
        info!(
            root = %root,
            processed = report.processed,
            kept = report.kept,
            cache_hits = report.cache_hits,
            failed = report.failed,
            "root finished"
        );
        total.merge(report);

        if let Some((index, rows)) = &citations {
            let report = crawler.expand_citations(index, root, *rows).await;
            info!(
                root = %root,
                cited = report.processed,
                kept = report.kept,
                "citation expansion finished"
            );
            total.merge(report);
        }
    }

    info!(
        roots = roots.len(),
        processed = total.processed,
        kept = total.kept,
        cache_hits = total.cache_hits,
        failed = total.failed,
        filtered = total.filtered,
        "run complete"
    );

    Ok(())
}
