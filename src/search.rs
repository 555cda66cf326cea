//! Video search: turning a catalog row into a single result link.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the downloader can be exercised
//! without a network:
//! - [`QueryPolicy`]: Builds the ordered list of queries to try for a row
//! - [`VideoSearch`]: Resolves one query to at most one link
//! - [`YtDlpSearch`]: [`VideoSearch`] backed by `yt-dlp "ytsearch1:…"`
//! - [`resolve_link`]: Walks a policy's attempts until one hits
//!
//! # Query Policies
//!
//! | Policy | Full-match query | Attempts |
//! |--------|------------------|----------|
//! | [`PlainQuery`] | `Title Author` | `"… audio"`, then bare |
//! | [`HyphenatedQuery`] | `TitleNoSpaces-AuthorNoSpaces` | single |

use crate::error::ClipError;
use crate::models::CatalogRecord;
use crate::utils::truncate_for_log;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Qualifier appended to bias results toward music uploads.
pub const AUDIO_QUALIFIER: &str = "audio";

/// Strategy for turning a record into search queries.
pub trait QueryPolicy: Send + Sync {
    /// Queries to try, most specific first. Never empty for a titled record.
    fn attempts(&self, record: &CatalogRecord) -> Vec<String>;
}

/// `"Title Author audio"`, falling back to `"Title Author"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainQuery;

impl QueryPolicy for PlainQuery {
    fn attempts(&self, record: &CatalogRecord) -> Vec<String> {
        let base = match record.primary_author() {
            Some(author) => format!("{} {}", record.title.trim(), author),
            None => record.title.trim().to_string(),
        };
        vec![format!("{base} {AUDIO_QUALIFIER}"), base]
    }
}

/// `"TitleNoSpaces-AuthorNoSpaces"`, single attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct HyphenatedQuery;

impl QueryPolicy for HyphenatedQuery {
    fn attempts(&self, record: &CatalogRecord) -> Vec<String> {
        let query = match record.primary_author() {
            Some(author) => format!("{}-{}", record.title.replace(' ', ""), author.replace(' ', "")),
            None => record.title.trim().to_string(),
        };
        vec![query]
    }
}

/// Query policy selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QueryStyle {
    /// Plain query with an "audio" qualifier first
    #[default]
    Plain,
    /// Space-stripped hyphenated query
    Hyphenated,
}

impl QueryStyle {
    pub fn policy(self) -> Box<dyn QueryPolicy> {
        match self {
            QueryStyle::Plain => Box::new(PlainQuery),
            QueryStyle::Hyphenated => Box::new(HyphenatedQuery),
        }
    }
}

/// Resolves a text query to the link of its top result.
pub trait VideoSearch {
    /// `Ok(None)` is a miss; `Err` means the search itself broke.
    async fn first_link(&self, query: &str) -> Result<Option<String>, ClipError>;
}

/// A link found by [`resolve_link`], with the query that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub query: String,
    pub link: String,
}

/// Try each query in order and return the first hit.
#[instrument(level = "debug", skip(search))]
pub async fn resolve_link<S: VideoSearch>(search: &S, attempts: &[String]) -> Result<Option<Resolved>, ClipError> {
    for query in attempts {
        if let Some(link) = search.first_link(query).await? {
            debug!(%query, %link, "Search hit");
            return Ok(Some(Resolved {
                query: query.clone(),
                link,
            }));
        }
        debug!(%query, "Search miss");
    }
    Ok(None)
}

/// [`VideoSearch`] that shells out to `yt-dlp` with a `ytsearch1:` URL.
#[derive(Debug, Clone)]
pub struct YtDlpSearch {
    /// Path to the yt-dlp executable.
    pub binary: PathBuf,
    /// Network timeout handed to yt-dlp.
    pub socket_timeout: Duration,
}

impl YtDlpSearch {
    pub fn new(binary: impl Into<PathBuf>, socket_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            socket_timeout,
        }
    }
}

/// First `http(s)` line of yt-dlp's `--print url` output.
pub fn parse_search_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
}

impl VideoSearch for YtDlpSearch {
    #[instrument(level = "debug", skip(self))]
    async fn first_link(&self, query: &str) -> Result<Option<String>, ClipError> {
        let t0 = Instant::now();
        let output = Command::new(&self.binary)
            .arg("--flat-playlist")
            .args(["--print", "url"])
            .arg("--no-warnings")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().to_string())
            .arg(format!("ytsearch1:{query}"))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ClipError::Search {
                query: query.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                %query,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                stderr = %truncate_for_log(stderr.trim(), 300),
                "yt-dlp search failed"
            );
            return Err(ClipError::Search {
                query: query.to_string(),
                message: truncate_for_log(stderr.trim(), 300),
            });
        }

        Ok(parse_search_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned search results keyed by query; records every query it sees.
    struct FakeSearch {
        hits: HashMap<String, String>,
        fail_on: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeSearch {
        fn new(hits: &[(&str, &str)]) -> Self {
            Self {
                hits: hits.iter().map(|(q, l)| (q.to_string(), l.to_string())).collect(),
                fail_on: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl VideoSearch for FakeSearch {
        async fn first_link(&self, query: &str) -> Result<Option<String>, ClipError> {
            self.seen.lock().unwrap().push(query.to_string());
            if self.fail_on.as_deref() == Some(query) {
                return Err(ClipError::Search {
                    query: query.to_string(),
                    message: "boom".into(),
                });
            }
            Ok(self.hits.get(query).cloned())
        }
    }

    #[test]
    fn test_plain_query_with_author() {
        let record = CatalogRecord::new("All of Me", Some("Gerald Marks/Seymour Simons"), None);
        assert_eq!(
            PlainQuery.attempts(&record),
            vec!["All of Me Gerald Marks audio".to_string(), "All of Me Gerald Marks".to_string()]
        );
    }

    #[test]
    fn test_plain_query_title_only() {
        let record = CatalogRecord::new("Nardis", None, None);
        assert_eq!(PlainQuery.attempts(&record), vec!["Nardis audio".to_string(), "Nardis".to_string()]);
    }

    #[test]
    fn test_hyphenated_query() {
        let record = CatalogRecord::new("Autumn Leaves", Some("Joseph Kosma"), None);
        assert_eq!(HyphenatedQuery.attempts(&record), vec!["AutumnLeaves-JosephKosma".to_string()]);
        let record = CatalogRecord::new("Blue Monk", None, None);
        assert_eq!(HyphenatedQuery.attempts(&record), vec!["Blue Monk".to_string()]);
    }

    #[test]
    fn test_query_style_selects_policy() {
        let record = CatalogRecord::new("Solar", Some("Miles Davis"), None);
        assert_eq!(QueryStyle::Hyphenated.policy().attempts(&record), vec!["Solar-MilesDavis".to_string()]);
        assert_eq!(QueryStyle::default().policy().attempts(&record).len(), 2);
    }

    #[test]
    fn test_parse_search_output() {
        let out = "NA\nhttps://www.youtube.com/watch?v=abc123\n";
        assert_eq!(parse_search_output(out).as_deref(), Some("https://www.youtube.com/watch?v=abc123"));
        assert_eq!(parse_search_output("\n"), None);
    }

    #[tokio::test]
    async fn test_resolve_link_prefers_qualified_query() {
        let search = FakeSearch::new(&[("Nardis audio", "https://y/1"), ("Nardis", "https://y/2")]);
        let attempts = vec!["Nardis audio".to_string(), "Nardis".to_string()];
        let resolved = resolve_link(&search, &attempts).await.unwrap().unwrap();
        assert_eq!(resolved.link, "https://y/1");
        assert_eq!(search.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_link_falls_back_without_qualifier() {
        let search = FakeSearch::new(&[("Nardis", "https://y/2")]);
        let attempts = vec!["Nardis audio".to_string(), "Nardis".to_string()];
        let resolved = resolve_link(&search, &attempts).await.unwrap().unwrap();
        assert_eq!(resolved, Resolved { query: "Nardis".into(), link: "https://y/2".into() });
    }

    #[tokio::test]
    async fn test_resolve_link_miss_and_error() {
        let search = FakeSearch::new(&[]);
        let attempts = vec!["x audio".to_string(), "x".to_string()];
        assert_eq!(resolve_link(&search, &attempts).await.unwrap(), None);

        let mut failing = FakeSearch::new(&[("x", "https://y/3")]);
        failing.fail_on = Some("x audio".into());
        let err = resolve_link(&failing, &attempts).await.unwrap_err();
        assert!(matches!(err, ClipError::Search { .. }));
    }
}
