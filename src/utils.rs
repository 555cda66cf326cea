//! Utility functions for name handling, progress reporting, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Name normalization (the join key between catalog rows and clip files)
//! - Filename sanitization for clip destinations
//! - String truncation for logging
//! - Progress bar construction
//! - File system validation for destination directories

use any_ascii::any_ascii;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Longest filename stem (in characters) a clip may be saved under.
pub const MAX_FILENAME_CHARS: usize = 150;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static regex"));

/// Normalize a display name into the key used to match clips to catalog rows.
///
/// Lowercases, trims, strips diacritics (NFKD, dropping combining marks) and
/// transliterates whatever non-ASCII remains. The result is idempotent:
/// `normalize_name(&normalize_name(x)) == normalize_name(x)`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_name("  São Paulo "), "sao paulo");
/// assert_eq!(normalize_name("sao paulo"), "sao paulo");
/// ```
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    any_ascii(&stripped).to_lowercase().trim().to_string()
}

/// Make a display name safe to use as a filename.
///
/// Removes `\ / * ? : " < > |` and keeps at most [`MAX_FILENAME_CHARS`]
/// characters.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(name, "")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Length of the clip to cut from a source of `source_secs` seconds.
///
/// Returns `None` when the source has no usable audio.
pub fn clip_length(source_secs: f64, max_secs: f64) -> Option<f64> {
    if !source_secs.is_finite() || source_secs <= 0.0 {
        return None;
    }
    Some(source_secs.min(max_secs))
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Progress bar with the style shared by the scraper and downloader.
pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed (idempotent), then performs a write test
/// by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Destination directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
