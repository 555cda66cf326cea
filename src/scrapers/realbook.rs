//! Real Book Site scraper.
//!
//! The index page groups songs into alphabetical `div.letter-section` blocks.
//! Each song has a detail page with the title in `h1.entry-title` and a
//! right-aligned "year – author" line inside `div.entry-content`.

use crate::error::PipelineError;
use crate::models::CatalogRecord;
use crate::utils::progress_bar;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Default index page.
pub const BASE_URL: &str = "https://realbook.site";

/// Pause between consecutive page requests.
pub const PAGE_DELAY: Duration = Duration::from_millis(50);

/// Per-page request timeout.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

static LETTER_SECTION_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.letter-section a[href]").expect("static selector"));
static LETTER_SECTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.letter-section").expect("static selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.entry-title").expect("static selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.entry-content").expect("static selector"));
static AUTHOR_LINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[align="right"]"#).expect("static selector"));

/// Result of a full scrape.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    /// Deduplicated records, in discovery order.
    pub records: Vec<CatalogRecord>,
    /// Detail pages that failed to fetch or had no title.
    pub failed_links: Vec<String>,
    /// Number of exact duplicates dropped.
    pub duplicates: usize,
}

/// HTTP client used for every scraper request.
pub fn build_client() -> Result<Client, Box<dyn Error>> {
    let client = Client::builder()
        .timeout(PAGE_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Extract the unique, sorted song links from the index page HTML.
///
/// Only links that point back at `base_url` (absolute or root-relative) are
/// kept; root-relative links are resolved against `base_url`. Protocol-relative
/// `//host/...` links name another host and are skipped.
pub fn extract_song_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    if document.select(&LETTER_SECTION).next().is_none() {
        error!(base = %base_url, "No 'letter-section' blocks on index page");
        return Vec::new();
    }

    let base_str = base_url.as_str().trim_end_matches('/');
    document
        .select(&LETTER_SECTION_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            if href.starts_with(base_str) {
                Some(href.to_string())
            } else if href.starts_with('/') && !href.starts_with("//") {
                base_url.join(href).ok().map(|u| u.to_string())
            } else {
                None
            }
        })
        .sorted()
        .dedup()
        .collect()
}

/// Index the Real Book homepage to extract song detail URLs.
///
/// # Errors
///
/// Fails if the index page cannot be fetched; this aborts the scrape.
#[instrument(level = "info", skip(client))]
pub async fn index_song_links(client: &Client, base_url: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let base = Url::parse(base_url)?;
    info!(%base, "Fetching index page");
    let html = client
        .get(base.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let links = extract_song_links(&html, &base);
    info!(count = links.len(), source = %base, "Indexed unique song links");
    debug!(urls = ?links, "Song URLs");
    Ok(links)
}

/// Split the right-aligned "year – author" line into `(author, year)`.
///
/// The en-dash separator wins over the hyphen; with neither, the whole line
/// is the author and the year is unknown.
pub fn split_author_year(text: &str) -> (Option<String>, Option<String>) {
    let text = text.trim();
    if text.is_empty() {
        return (None, None);
    }
    let separator = [" – ", " - "].into_iter().find(|sep| text.contains(sep));
    match separator.and_then(|sep| text.split_once(sep)) {
        Some((year, author)) => (non_blank(author), non_blank(year)),
        None => (Some(text.to_string()), None),
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Parse a song detail page. Returns `None` when no title can be found.
pub fn parse_song_page(html: &str) -> Option<CatalogRecord> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE)
        .next()
        .map(|h1| h1.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())?;

    let (author, year) = document
        .select(&CONTENT)
        .next()
        .and_then(|content| content.select(&AUTHOR_LINE).next())
        .map(|line| split_author_year(&line.text().collect::<String>()))
        .unwrap_or((None, None));

    Some(CatalogRecord::new(title, author.as_deref(), year.as_deref()))
}

/// Fetch a single song page
#[instrument(level = "debug", skip(client))]
pub async fn fetch_song_details(client: &Client, url: &str) -> Result<Option<CatalogRecord>, Box<dyn Error>> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_song_page(&body))
}

/// Drop exact `(title, author, year)` duplicates, keeping first occurrences.
pub fn dedupe_records(records: Vec<CatalogRecord>) -> (Vec<CatalogRecord>, usize) {
    let before = records.len();
    let unique: Vec<CatalogRecord> = records.into_iter().unique().collect();
    let dropped = before - unique.len();
    (unique, dropped)
}

/// Walk the index and every song page, producing a deduplicated catalog.
///
/// Requests are made one at a time with `delay` between them. Per-page
/// failures are logged and counted; only an unreachable index, an empty
/// index, or zero extracted songs are fatal.
#[instrument(level = "info", skip(client))]
pub async fn scrape_catalog(
    client: &Client,
    base_url: &str,
    delay: Duration,
) -> Result<ScrapeReport, Box<dyn Error>> {
    let links = index_song_links(client, base_url).await?;
    if links.is_empty() {
        return Err(PipelineError::NoSongLinks(base_url.to_string()).into());
    }

    let pb = progress_bar(links.len() as u64, "Extracting song data");
    let attempted = links.len();
    let results: Vec<Result<CatalogRecord, String>> = stream::iter(links)
        .then(|url: String| {
            let pb = &pb;
            async move {
                let result = match fetch_song_details(client, &url).await {
                    Ok(Some(record)) => {
                        debug!(%url, title = %record.title, "Parsed song page");
                        Ok(record)
                    }
                    Ok(None) => {
                        warn!(%url, "Song page has no title");
                        Err(url)
                    }
                    Err(e) => {
                        warn!(error = %e, %url, "Song page fetch failed");
                        Err(url)
                    }
                };
                pb.inc(1);
                tokio::time::sleep(delay).await;
                result
            }
        })
        .collect()
        .await;
    pb.finish_and_clear();

    let (records, failed_links): (Vec<_>, Vec<_>) = results.into_iter().partition_result();
    if records.is_empty() {
        return Err(PipelineError::NoRecordsExtracted { attempted }.into());
    }

    let (records, duplicates) = dedupe_records(records);
    info!(
        records = records.len(),
        failed = failed_links.len(),
        duplicates,
        "Scrape finished"
    );
    Ok(ScrapeReport {
        records,
        failed_links,
        duplicates,
    })
}
