//! Data models shared by the three pipeline stages.
//!
//! This module defines the core data structures used throughout the application:
//! - [`CatalogRecord`]: One scraped song (title, author, year)
//! - [`SearchStrategy`]: Which query shape found a song, and where its clip lives
//! - [`AnnotatedRecord`]: A catalog row plus its reconciliation status
//! - [`DownloadOutcome`] / [`FailureReason`]: Per-row results of the downloader
//! - [`BatchSummary`]: Aggregated downloader results
//!
//! The CSV column names are Portuguese (`Titulo`, `Autor`, `Ano`, `busca`)
//! because downstream spreadsheets already depend on them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Folder holding clips found with a "title + primary author" query.
pub const FULL_MATCH_DIR: &str = "busca_completa";

/// Folder holding clips found with a title-only query.
pub const TITLE_ONLY_DIR: &str = "busca_por_titulo";

/// A song as scraped from the index site.
///
/// Records are treated as immutable once scraped. Uniqueness is the exact
/// `(title, author, year)` triple.
///
/// # Fields
///
/// * `title` - Song title (always present)
/// * `author` - Optional `/`-delimited list of co-authors
/// * `year` - Optional year, kept as free text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CatalogRecord {
    #[serde(rename = "Titulo")]
    pub title: String,
    #[serde(rename = "Autor")]
    pub author: Option<String>,
    #[serde(rename = "Ano")]
    pub year: Option<String>,
}

impl CatalogRecord {
    /// Build a record, treating blank author/year as absent.
    pub fn new(title: impl Into<String>, author: Option<&str>, year: Option<&str>) -> Self {
        let title: String = title.into();
        Self {
            title: title.trim().to_string(),
            author: non_blank(author),
            year: non_blank(year),
        }
    }

    /// The author field, if it has any non-whitespace content.
    pub fn author(&self) -> Option<&str> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// First of the `/`-delimited co-authors, trimmed.
    pub fn primary_author(&self) -> Option<&str> {
        self.author()
            .and_then(|a| a.split('/').next())
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// `"title - primary author"`, or just the title when no author is known.
    ///
    /// This is the name clips are saved under and the key the reconciler
    /// looks up in the full-match folder.
    pub fn display_name(&self) -> String {
        match self.primary_author() {
            Some(author) => format!("{} - {}", self.title.trim(), author),
            None => self.title.trim().to_string(),
        }
    }

    /// Which destination a download for this record goes to.
    pub fn strategy(&self) -> SearchStrategy {
        if self.primary_author().is_some() {
            SearchStrategy::Full
        } else {
            SearchStrategy::TitleOnly
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The query shape that produced (or would produce) a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SearchStrategy {
    /// Searched by title alone; stored in [`TITLE_ONLY_DIR`].
    TitleOnly,
    /// Searched by title and primary author; stored in [`FULL_MATCH_DIR`].
    Full,
}

impl SearchStrategy {
    /// Token written to the `busca` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::TitleOnly => "titulo",
            SearchStrategy::Full => "completa",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog row annotated by the reconciler.
///
/// Serialized with lowercase headers: `titulo,autor,ano,status,busca`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedRecord {
    pub titulo: String,
    pub autor: String,
    pub ano: String,
    pub status: u8,
    pub busca: String,
}

impl AnnotatedRecord {
    pub fn new(record: &CatalogRecord, matched: Option<SearchStrategy>) -> Self {
        Self {
            titulo: record.title.clone(),
            autor: record.author.clone().unwrap_or_default(),
            ano: record.year.clone().unwrap_or_default(),
            status: u8::from(matched.is_some()),
            busca: matched.map(|s| s.as_str().to_string()).unwrap_or_default(),
        }
    }
}

/// Why a single downloader row did not produce a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureReason {
    EmptyTitle,
    NotFound,
    SearchError,
    DownloadError,
    MissingArtifact,
    ZeroDuration,
    TrimError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::EmptyTitle => "empty title",
            FailureReason::NotFound => "video not found",
            FailureReason::SearchError => "search error",
            FailureReason::DownloadError => "download error",
            FailureReason::MissingArtifact => "download produced no file",
            FailureReason::ZeroDuration => "zero-length audio",
            FailureReason::TrimError => "trim error",
        };
        f.write_str(s)
    }
}

/// Result of processing one downloader row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success {
        display_name: String,
        strategy: SearchStrategy,
    },
    Failure {
        display_name: String,
        query: Option<String>,
        reason: FailureReason,
        detail: Option<String>,
    },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }
}

/// Running totals for a download batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub successes: usize,
    pub failures: usize,
    pub by_strategy: BTreeMap<SearchStrategy, usize>,
    pub by_reason: BTreeMap<FailureReason, usize>,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Success { strategy, .. } => {
                self.successes += 1;
                *self.by_strategy.entry(*strategy).or_default() += 1;
            }
            DownloadOutcome::Failure { reason, .. } => {
                self.failures += 1;
                *self.by_reason.entry(*reason).or_default() += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.successes + self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_author_with_coauthors() {
        let record = CatalogRecord::new("All of Me", Some("Gerald Marks/Seymour Simons"), Some("1931"));
        assert_eq!(record.primary_author(), Some("Gerald Marks"));
        assert_eq!(record.display_name(), "All of Me - Gerald Marks");
        assert_eq!(record.strategy(), SearchStrategy::Full);
    }

    #[test]
    fn test_primary_author_trims_segments() {
        let record = CatalogRecord::new("Song", Some("  A  / B "), None);
        assert_eq!(record.primary_author(), Some("A"));
    }

    #[test]
    fn test_blank_author_is_title_only() {
        let record = CatalogRecord::new("Nardis", Some("   "), Some(""));
        assert_eq!(record.author, None);
        assert_eq!(record.year, None);
        assert_eq!(record.display_name(), "Nardis");
        assert_eq!(record.strategy(), SearchStrategy::TitleOnly);
    }

    #[test]
    fn test_strategy_tokens() {
        assert_eq!(SearchStrategy::Full.as_str(), "completa");
        assert_eq!(SearchStrategy::TitleOnly.to_string(), "titulo");
    }

    #[test]
    fn test_annotated_record_unmatched() {
        let record = CatalogRecord::new("Blue Monk", None, None);
        let annotated = AnnotatedRecord::new(&record, None);
        assert_eq!(annotated.status, 0);
        assert_eq!(annotated.busca, "");
        assert_eq!(annotated.autor, "");
    }

    #[test]
    fn test_annotated_record_matched() {
        let record = CatalogRecord::new("Autumn Leaves", Some("Joseph Kosma"), Some("1945"));
        let annotated = AnnotatedRecord::new(&record, Some(SearchStrategy::Full));
        assert_eq!(annotated.status, 1);
        assert_eq!(annotated.busca, "completa");
        assert_eq!(annotated.ano, "1945");
    }

    #[test]
    fn test_batch_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.record(&DownloadOutcome::Success {
            display_name: "A".into(),
            strategy: SearchStrategy::Full,
        });
        summary.record(&DownloadOutcome::Failure {
            display_name: "B".into(),
            query: Some("B audio".into()),
            reason: FailureReason::NotFound,
            detail: None,
        });
        summary.record(&DownloadOutcome::Failure {
            display_name: "C".into(),
            query: None,
            reason: FailureReason::NotFound,
            detail: None,
        });

        assert_eq!(summary.successes, 1);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.by_reason.get(&FailureReason::NotFound), Some(&2));
        assert_eq!(summary.by_strategy.get(&SearchStrategy::Full), Some(&1));
    }
}
