//! Per-row failure log for the downloader.
//!
//! A [`FailureLog`] is opened (and truncated) when a batch starts, receives
//! one line per failed row, and is flushed by [`FailureLog::close`] when the
//! batch ends. It is owned by the single consumer of download outcomes, so it
//! needs no locking.

use crate::models::DownloadOutcome;
use chrono::Local;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument};

/// Default failure log filename.
pub const LOG_FILE: &str = "erros.log";

#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: usize,
}

/// Render one failure as a log line (no trailing newline).
pub fn format_failure(outcome: &DownloadOutcome, timestamp: &str) -> Option<String> {
    let DownloadOutcome::Failure {
        display_name,
        query,
        reason,
        detail,
    } = outcome
    else {
        return None;
    };
    let mut line = format!("{timestamp} - ERROR - {reason} for '{display_name}'");
    if let Some(query) = query {
        line.push_str(&format!(" (query: '{query}')"));
    }
    if let Some(detail) = detail {
        line.push_str(": ");
        line.push_str(detail);
    }
    Some(line)
}

impl FailureLog {
    /// Create or truncate the log file.
    #[instrument(level = "info", fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file = File::create(path).await?;
        info!("Failure log opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the outcome if it is a failure; successes are ignored.
    pub async fn record(&mut self, outcome: &DownloadOutcome) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        if let Some(line) = format_failure(outcome, &timestamp) {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.entries += 1;
        }
        Ok(())
    }

    /// Flush and close, returning how many failures were written.
    pub async fn close(mut self) -> std::io::Result<usize> {
        self.writer.flush().await?;
        self.writer.into_inner().sync_all().await?;
        info!(path = %self.path.display(), entries = self.entries, "Failure log closed");
        Ok(self.entries)
    }
}
