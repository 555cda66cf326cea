//! Error types for the pipeline.
//!
//! [`PipelineError`] covers the setup-phase failures that abort a stage before
//! any output is written. [`ClipError`] covers everything that can go wrong
//! while turning one catalog row into a clip; it never escapes the row.

use crate::models::FailureReason;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input catalog does not exist
    #[error("catalog file '{0}' not found; run the scrape stage first")]
    CatalogNotFound(PathBuf),

    /// The index page yielded no song links
    #[error("no song links found on index page {0}")]
    NoSongLinks(String),

    /// Every detail page failed
    #[error("no song data extracted from {attempted} pages")]
    NoRecordsExtracted { attempted: usize },
}

/// Per-row failures while searching, downloading, or trimming a clip.
#[derive(Error, Debug)]
pub enum ClipError {
    /// The video search itself failed (not a miss)
    #[error("search failed for '{query}': {message}")]
    Search { query: String, message: String },

    /// yt-dlp exited with an error
    #[error("download failed: {0}")]
    Download(String),

    /// yt-dlp reported success but the temp file is absent (e.g. size cap hit)
    #[error("download produced no file at {0}")]
    MissingArtifact(PathBuf),

    /// The downloaded audio has no usable length
    #[error("audio has zero duration")]
    ZeroDuration,

    /// ffprobe failed or printed something that is not a duration
    #[error("could not probe duration: {0}")]
    Probe(String),

    /// ffmpeg failed while cutting the clip
    #[error("trim failed: {0}")]
    Trim(String),

    /// Spawning a tool or touching the filesystem failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClipError {
    /// Collapse the error into the reason recorded in the batch summary.
    pub fn reason(&self) -> FailureReason {
        match self {
            ClipError::Search { .. } => FailureReason::SearchError,
            ClipError::Download(_) | ClipError::Io(_) => FailureReason::DownloadError,
            ClipError::MissingArtifact(_) => FailureReason::MissingArtifact,
            ClipError::ZeroDuration => FailureReason::ZeroDuration,
            ClipError::Probe(_) | ClipError::Trim(_) => FailureReason::TrimError,
        }
    }
}
