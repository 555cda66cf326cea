//! Match catalog rows against clips already on disk.
//!
//! The destination folders are listed once per run into a [`DownloadedIndex`];
//! after that every lookup is an in-memory set membership test on normalized
//! names. The folders are treated as an external source of truth that may
//! change between runs, never as a live index.

use crate::models::{AnnotatedRecord, CatalogRecord, SearchStrategy};
use crate::utils::{normalize_name, sanitize_filename};
use std::collections::HashSet;
use std::error::Error;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Prefix of the transient download artifact.
pub const TEMP_PREFIX: &str = "temp_";

/// Suffix of the transient download artifact.
pub const TEMP_SUFFIX: &str = ".mp3.mp3";

/// Name of the transient artifact for a sanitized clip name.
pub fn temp_file_name(sanitized: &str) -> String {
    format!("{TEMP_PREFIX}{sanitized}{TEMP_SUFFIX}")
}

/// Recover the display name wrapped in a `temp_*.mp3.mp3` filename.
pub fn strip_temp_wrapper(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(TEMP_PREFIX)
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
}

/// Normalized names of everything already downloaded, per strategy.
#[derive(Debug, Default, Clone)]
pub struct DownloadedIndex {
    pub full: HashSet<String>,
    pub title_only: HashSet<String>,
}

impl DownloadedIndex {
    /// List both destination folders.
    pub async fn load(full_dir: &Path, title_dir: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            full: scan_folder(full_dir).await?,
            title_only: scan_folder(title_dir).await?,
        })
    }

    /// Which strategy, if any, already produced a clip for `record`.
    ///
    /// A full ("title - author") match wins over a title-only match. Names
    /// are sanitized the same way the downloader names its files.
    pub fn lookup(&self, record: &CatalogRecord) -> Option<SearchStrategy> {
        if self.full.contains(&file_key(&record.display_name())) {
            Some(SearchStrategy::Full)
        } else if self.title_only.contains(&file_key(&record.title)) {
            Some(SearchStrategy::TitleOnly)
        } else {
            None
        }
    }
}

fn file_key(name: &str) -> String {
    normalize_name(&sanitize_filename(name))
}

/// Collect the normalized names of every `temp_*.mp3.mp3` file in `dir`.
///
/// A missing folder yields an empty set.
#[instrument(level = "info", fields(dir = %dir.display()))]
pub async fn scan_folder(dir: &Path) -> Result<HashSet<String>, Box<dyn Error>> {
    let mut names = HashSet::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Folder does not exist; treating as empty");
            return Ok(names);
        }
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(name) = strip_temp_wrapper(file_name) {
            names.insert(file_key(name));
        }
    }
    info!(count = names.len(), "Scanned downloaded clips");
    Ok(names)
}

/// Annotate one catalog row.
pub fn reconcile_record(record: &CatalogRecord, index: &DownloadedIndex) -> AnnotatedRecord {
    let matched = index.lookup(record);
    debug!(title = %record.title, ?matched, "Reconciled row");
    AnnotatedRecord::new(record, matched)
}

/// Totals for a reconcile run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub full: usize,
    pub title_only: usize,
    pub missing: usize,
}

/// Annotate every row, returning the rows and their totals.
pub fn reconcile_all(records: &[CatalogRecord], index: &DownloadedIndex) -> (Vec<AnnotatedRecord>, ReconcileSummary) {
    let mut summary = ReconcileSummary::default();
    let rows = records
        .iter()
        .map(|record| {
            let row = reconcile_record(record, index);
            match row.busca.as_str() {
                "completa" => summary.full += 1,
                "titulo" => summary.title_only += 1,
                _ => summary.missing += 1,
            }
            row
        })
        .collect();
    (rows, summary)
}
