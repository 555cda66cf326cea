//! Bulk clip download orchestration.
//!
//! Rows are processed as independent tasks, at most `workers` at a time. Each
//! task resolves its own outcome and hands it to a single consumer through
//! the completion stream; no row can fail the batch.

use crate::clip::ClipFetcher;
use crate::error::ClipError;
use crate::models::{BatchSummary, CatalogRecord, DownloadOutcome, FailureReason, SearchStrategy};
use crate::report::FailureLog;
use crate::search::{QueryPolicy, VideoSearch, resolve_link};
use crate::utils::progress_bar;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Default number of rows in flight.
pub const MAX_WORKERS: usize = 4;

/// Default pause before each row's first search.
pub const ROW_DELAY: Duration = Duration::from_millis(100);

/// Batch-wide settings.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub full_dir: PathBuf,
    pub title_dir: PathBuf,
    pub workers: usize,
    pub row_delay: Duration,
}

impl DownloadConfig {
    fn folder(&self, strategy: SearchStrategy) -> &PathBuf {
        match strategy {
            SearchStrategy::Full => &self.full_dir,
            SearchStrategy::TitleOnly => &self.title_dir,
        }
    }
}

/// Search for, download and trim the clip for one row.
///
/// Every failure is converted into a [`DownloadOutcome::Failure`].
#[instrument(level = "debug", skip_all, fields(title = %record.title))]
pub async fn process_row<S, F>(
    record: &CatalogRecord,
    policy: &dyn QueryPolicy,
    search: &S,
    fetcher: &F,
    config: &DownloadConfig,
) -> DownloadOutcome
where
    S: VideoSearch,
    F: ClipFetcher,
{
    let display_name = record.display_name();
    if record.title.trim().is_empty() {
        return DownloadOutcome::Failure {
            display_name,
            query: None,
            reason: FailureReason::EmptyTitle,
            detail: None,
        };
    }

    let strategy = record.strategy();
    let attempts = policy.attempts(record);
    sleep(config.row_delay).await;

    let resolved = match resolve_link(search, &attempts).await {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            debug!(%display_name, "No search result");
            return DownloadOutcome::Failure {
                display_name,
                query: attempts.last().cloned(),
                reason: FailureReason::NotFound,
                detail: None,
            };
        }
        Err(e) => {
            error!(%display_name, error = %e, "Search failed");
            let query = match &e {
                ClipError::Search { query, .. } => Some(query.clone()),
                _ => attempts.first().cloned(),
            };
            return DownloadOutcome::Failure {
                display_name,
                query,
                reason: e.reason(),
                detail: Some(e.to_string()),
            };
        }
    };

    match fetcher
        .fetch_clip(&resolved.link, config.folder(strategy), &display_name)
        .await
    {
        Ok(path) => {
            debug!(%display_name, path = %path.display(), "Clip saved");
            DownloadOutcome::Success {
                display_name,
                strategy,
            }
        }
        Err(e) => {
            error!(%display_name, link = %resolved.link, error = %e, "Download/processing failed");
            DownloadOutcome::Failure {
                display_name,
                query: Some(resolved.query),
                reason: e.reason(),
                detail: Some(e.to_string()),
            }
        }
    }
}

/// Process every row with bounded concurrency and summarize the results.
///
/// Failures are appended to `log` as they arrive; a log write error is
/// reported but does not stop the batch.
#[instrument(level = "info", skip_all, fields(rows = records.len(), workers = config.workers))]
pub async fn run_batch<S, F>(
    records: &[CatalogRecord],
    policy: &dyn QueryPolicy,
    search: &S,
    fetcher: &F,
    config: &DownloadConfig,
    log: &mut FailureLog,
) -> BatchSummary
where
    S: VideoSearch,
    F: ClipFetcher,
{
    let workers = config.workers.max(1);
    let pb = progress_bar(records.len() as u64, "Downloading songs");
    let mut summary = BatchSummary::default();

    let mut outcomes = stream::iter(records)
        .map(|record| process_row(record, policy, search, fetcher, config))
        .buffer_unordered(workers);

    while let Some(outcome) = outcomes.next().await {
        summary.record(&outcome);
        if !outcome.is_success() {
            if let Err(e) = log.record(&outcome).await {
                warn!(error = %e, path = %log.path().display(), "Could not write failure log entry");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        total = summary.total(),
        successful = summary.successes,
        failed = summary.failures,
        "Download batch complete"
    );
    summary
}
