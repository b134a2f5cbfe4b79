//! # Interview Scraper
//!
//! Collects interviews, postmortems and developer Q&As about roguelike games
//! from the web and archives them for offline analysis.
//!
//! ## Usage
//!
//! ```sh
//! interview_scraper -v discover
//! interview_scraper -v archive
//! ```
//!
//! ## Architecture
//!
//! The application is a two-stage, resumable pipeline:
//! 1. **Catalog**: load the reference list of games and normalize titles
//! 2. **Discovery**: one web search per game, scraped for result links
//! 3. **Archival**: download every result page and keep the raw body
//!
//! Both stages read and write a JSON cache, skip games that already have
//! results, and can be re-run at any point. Ctrl-C stops the queue and saves
//! what has been resolved so far.
//!
//! ## Exit codes
//!
//! `0` success, `1` general failure, `2` corrupt cache file, `3` malformed
//! catalog, `130` interrupted.

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod pipeline;
mod policy;
mod stages;
mod store;
mod utils;

use catalog::Catalog;
use cli::{Cli, Command};
use config::Settings;
use error::{PipelineError, StoreError};
use fetch::HttpFetcher;
use models::{ContentCache, LinkCache};
use pipeline::{Fetchers, Pipeline, StageReport, Stores};
use stages::discovery::SearchEngine;
use store::JsonFileStore;
use utils::ensure_writable_dir;

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    // --- Tracing init ---
    let default_level = if args.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    debug!(?args, "Parsed CLI arguments");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight work and saving");
            on_interrupt.cancel();
        }
    });

    let code = match run(args, cancel).await {
        Ok(report) if report.as_ref().is_some_and(|r| r.cancelled) => {
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("error: {e}");
            e.exit_code()
        }
    };

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    code
}

/// Run the selected command. Returns the stage report for stage commands.
#[instrument(level = "debug", skip_all)]
async fn run(args: Cli, cancel: CancellationToken) -> Result<Option<StageReport>, PipelineError> {
    let mut settings = Settings::load(args.config.as_deref()).await?;
    if let Some(dir) = args.cache_dir {
        settings.cache_dir = dir;
    }
    if let Some(path) = args.catalog {
        settings.catalog_path = Some(path);
    }
    if let Some(n) = args.concurrency {
        settings.entity_concurrency = n;
    }
    settings.validate()?;

    let catalog = Catalog::load(settings.catalog_path.as_deref()).await?;

    let (is_discovery, opts) = match args.command {
        Command::Catalog => {
            print_json(&catalog)?;
            return Ok(None);
        }
        Command::Discover(stage) => (true, stage.options(args.verbose)),
        Command::Archive(stage) => (false, stage.options(args.verbose)),
    };

    // Early check: the cache directory must be writable before any fetching.
    if opts.write_back {
        ensure_writable_dir(&settings.cache_dir)
            .await
            .map_err(|source| PipelineError::Unwritable {
                path: settings.cache_dir.clone(),
                source,
            })?;
    }

    let stores = Stores {
        links: JsonFileStore::<LinkCache>::new(settings.link_cache_path()),
        content: JsonFileStore::<ContentCache>::new(settings.content_cache_path()),
    };
    debug!(
        links = %stores.links.path().display(),
        content = %stores.content.path().display(),
        "Cache files"
    );

    let pipeline = Pipeline::new(
        catalog,
        SearchEngine::new(&settings)?,
        Fetchers {
            search: HttpFetcher::new(settings.search_timeouts, &settings.user_agent)?,
            content: HttpFetcher::new(settings.content_timeouts, &settings.user_agent)?,
        },
        stores,
        &settings,
        cancel,
    );

    let report = if is_discovery {
        let run = pipeline.discover_links(&opts).await?;
        if run.report.from_file {
            print_json(&run.cache)?;
        }
        run.report
    } else {
        let run = pipeline.archive_content(&opts).await?;
        if run.report.from_file {
            print_json(&run.cache)?;
        }
        run.report
    };

    info!(
        total = report.total,
        cached = report.cached,
        fetched = report.fetched,
        failed_entities = report.failed_entities,
        failed_pages = report.failed_pages,
        "Run finished"
    );
    Ok(Some(report))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;
    println!("{json}");
    Ok(())
}
