//! # Realbook Clips
//!
//! A three-stage batch pipeline that builds a library of short audio previews
//! for every song in a Real Book index.
//!
//! ## Usage
//!
//! ```sh
//! realbook_clips scrape      # index site -> musicas_realbook_completo.csv
//! realbook_clips download    # catalog -> busca_completa/ + busca_por_titulo/
//! realbook_clips reconcile   # catalog + folders -> musicas_com_status.csv
//! ```
//!
//! ## Architecture
//!
//! The stages share nothing in memory; they communicate only through files:
//! 1. **Scrape**: Discover song pages, extract (title, author, year), dedupe, write CSV
//! 2. **Download**: For each row, search, download, trim to a clip (4 rows at a time)
//! 3. **Reconcile**: Match catalog rows to clips on disk by normalized name

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod clip;
mod download;
mod error;
mod models;
mod outputs;
mod reconcile;
mod report;
mod scrapers;
mod search;
mod utils;

use cli::{Cli, Command, DownloadArgs, ReconcileArgs, ScrapeArgs};
use clip::{ClipSettings, YtDlpFetcher};
use download::{DownloadConfig, run_batch};
use outputs::catalog;
use reconcile::{DownloadedIndex, reconcile_all};
use report::FailureLog;
use search::YtDlpSearch;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = match args.command {
        Command::Scrape(args) => run_scrape(args).await,
        Command::Reconcile(args) => run_reconcile(args).await,
        Command::Download(args) => run_download(args).await,
    };

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(?elapsed, secs = elapsed.as_secs(), "Execution complete"),
        Err(e) => error!(?elapsed, error = %e, "Execution aborted"),
    }
    result
}

#[instrument(level = "info", skip_all, fields(base_url = %args.base_url))]
async fn run_scrape(args: ScrapeArgs) -> Result<(), Box<dyn Error>> {
    info!("Starting Real Book scrape");
    let client = scrapers::realbook::build_client()?;
    let report =
        scrapers::realbook::scrape_catalog(&client, &args.base_url, Duration::from_millis(args.delay_ms)).await?;

    catalog::write_catalog(&args.output, &report.records).await?;
    info!(
        saved = report.records.len(),
        duplicates = report.duplicates,
        path = %args.output.display(),
        "Scrape complete"
    );

    if !report.failed_links.is_empty() {
        warn!(
            count = report.failed_links.len(),
            "Links could not be processed (no title found or request failed)"
        );
        if args.show_failed {
            for url in &report.failed_links {
                warn!(%url, "Failed link");
            }
        }
    }
    Ok(())
}

#[instrument(level = "info", skip_all, fields(catalog = %args.catalog.display()))]
async fn run_reconcile(args: ReconcileArgs) -> Result<(), Box<dyn Error>> {
    let records = catalog::read_catalog_positional(&args.catalog).await?;
    let index = DownloadedIndex::load(&args.folders.full_dir, &args.folders.title_dir).await?;
    info!(
        full = index.full.len(),
        title_only = index.title_only.len(),
        "Built downloaded-clip index"
    );

    let (rows, summary) = reconcile_all(&records, &index);
    catalog::write_annotated(&args.output, &rows).await?;
    info!(
        rows = rows.len(),
        completa = summary.full,
        titulo = summary.title_only,
        missing = summary.missing,
        path = %args.output.display(),
        "Reconcile complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(catalog = %args.catalog.display()))]
async fn run_download(args: DownloadArgs) -> Result<(), Box<dyn Error>> {
    info!(log_file = %args.log_file.display(), "Starting audio downloads; row errors go to the failure log");

    let records = catalog::read_catalog(&args.catalog).await?;
    ensure_writable_dir(&args.folders.full_dir).await?;
    ensure_writable_dir(&args.folders.title_dir).await?;
    info!(count = records.len(), "Songs to process");

    let socket_timeout = Duration::from_secs(args.socket_timeout);
    let search = YtDlpSearch::new(&args.yt_dlp, socket_timeout);
    let fetcher = YtDlpFetcher {
        yt_dlp: args.yt_dlp.clone(),
        ffmpeg: args.ffmpeg.clone(),
        ffprobe: args.ffprobe.clone(),
        settings: ClipSettings {
            clip_secs: args.clip_seconds as f64,
            max_filesize_mb: args.max_filesize_mb,
            socket_timeout,
        },
    };
    let config = DownloadConfig {
        full_dir: args.folders.full_dir.clone(),
        title_dir: args.folders.title_dir.clone(),
        workers: args.workers,
        row_delay: Duration::from_millis(args.delay_ms),
    };
    let policy = args.query_policy.policy();

    let mut log = FailureLog::open(&args.log_file).await?;
    let summary = run_batch(&records, &*policy, &search, &fetcher, &config, &mut log).await;
    let logged = log.close().await?;

    info!(
        successful = summary.successes,
        failed = summary.failures,
        full = %args.folders.full_dir.display(),
        title_only = %args.folders.title_dir.display(),
        "Download process complete"
    );
    for (strategy, count) in &summary.by_strategy {
        info!(%strategy, count, "Clips saved by strategy");
    }
    for (reason, count) in &summary.by_reason {
        info!(%reason, count, "Failures by reason");
    }
    if summary.failures > 0 {
        warn!(entries = logged, path = %args.log_file.display(), "Details about the failures were saved to the failure log");
    }
    Ok(())
}
