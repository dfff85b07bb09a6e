//! Merges CLI flags and file defaults into a [`CrawlerConfig`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use refcrawler_core::config::CrawlerConfig;
use refcrawler_core::crawler::YoungFilter;
use refcrawler_core::metadata::default_young_keywords;
use refcrawler_core::parser::Doi;
use tracing::{debug, warn};

use crate::app_config::FileConfig;
use crate::cli::{Args, split_list};

/// Root crawled when no DOI is given.
pub(crate) const SAMPLE_ROOT_DOI: &str = "10.1126/science.177.4047.393";

/// Depth of the built-in sample crawl.
pub(crate) const SAMPLE_MAX_DEPTH: usize = 2;

/// The merged configuration plus how to present the run.
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub(crate) config: CrawlerConfig,
    pub(crate) prod: bool,
    /// Operator-supplied identifiers that were not DOIs.
    pub(crate) skipped: Vec<String>,
}

/// Builds the run configuration. CLI values win over file values.
///
/// Without `--doi` or `--recent`, the sample crawl runs: the built-in root,
/// depth 2, young-author filter on, production output.
pub(crate) fn build_run_plan(args: &Args, file: Option<&FileConfig>) -> Result<RunPlan> {
    let defaults = CrawlerConfig::default();
    let sample = args.is_sample_run();

    let (roots, skipped) = if sample {
        let root = Doi::parse(SAMPLE_ROOT_DOI)
            .ok_or_else(|| anyhow!("built-in sample DOI failed to normalize"))?;
        (vec![root], Vec::new())
    } else {
        parse_roots(args.doi.as_deref().unwrap_or_default())
    };

    let young_keywords = args
        .young_keywords
        .as_deref()
        .or_else(|| file.and_then(|f| f.young_keywords.as_deref()))
        .map_or_else(default_young_keywords, split_list);
    let young_filter = (args.young || sample).then(|| YoungFilter {
        target_depth: args.young_depth,
        keywords: young_keywords,
    });

    let timeout = match args.timeout.or_else(|| file.and_then(|f| f.timeout_secs)) {
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
            anyhow!("Invalid value for `timeout`: {secs}. Expected range: (0, 3600] seconds")
        })?,
        None => defaults.timeout,
    };

    let mirrors = args
        .mirrors
        .as_deref()
        .or_else(|| file.and_then(|f| f.mirrors.as_deref()))
        .map(split_list)
        .unwrap_or_default();

    let unpaywall_email = args
        .unpaywall_email
        .clone()
        .or_else(|| file.and_then(|f| f.unpaywall_email.clone()))
        .filter(|email| !email.trim().is_empty());

    let output_root: PathBuf = args
        .output_dir
        .clone()
        .or_else(|| file.and_then(|f| f.output_dir.clone()))
        .unwrap_or(defaults.output_root);

    let config = CrawlerConfig {
        roots,
        max_depth: if sample { SAMPLE_MAX_DEPTH } else { args.depth },
        workers: args
            .workers
            .or_else(|| file.and_then(|f| f.workers))
            .map_or(defaults.workers, usize::from),
        young_filter,
        rps: args.rps.or_else(|| file.and_then(|f| f.rps)).unwrap_or(defaults.rps),
        retries: args
            .retries
            .or_else(|| file.and_then(|f| f.retries))
            .unwrap_or(defaults.retries),
        backoff: args
            .backoff
            .or_else(|| file.and_then(|f| f.backoff))
            .unwrap_or(defaults.backoff),
        timeout,
        unpaywall_email,
        mirrors,
        cited_rows: args.cited.then_some(args.cited_rows),
        recent_query: args
            .recent
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(ToString::to_string),
        recent_rows: args.recent_rows,
        output_root,
    };
    debug!(?config, sample, "run configuration merged");

    Ok(RunPlan {
        config,
        prod: args.prod || sample,
        skipped,
    })
}

/// Parses operator DOIs, keeping order and dropping duplicates.
fn parse_roots(raw: &str) -> (Vec<Doi>, Vec<String>) {
    let mut roots: Vec<Doi> = Vec::new();
    let mut skipped = Vec::new();
    for fragment in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
    {
        match Doi::parse_strict(fragment) {
            Ok(doi) if roots.contains(&doi) => debug!(doi = %doi, "duplicate root ignored"),
            Ok(doi) => roots.push(doi),
            Err(e) => {
                warn!(input = fragment, error = %e, "skipping invalid DOI");
                skipped.push(fragment.to_string());
            }
        }
    }
    (roots, skipped)
}
