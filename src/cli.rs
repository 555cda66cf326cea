//! Command-line interface definitions for Realbook Clips.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option has a default, so each stage runs with no flags at all.

use crate::clip::{CLIP_SECONDS, MAX_FILESIZE_MB};
use crate::download::{MAX_WORKERS, ROW_DELAY};
use crate::models::{FULL_MATCH_DIR, TITLE_ONLY_DIR};
use crate::report::LOG_FILE;
use crate::scrapers::realbook::{BASE_URL, PAGE_DELAY};
use crate::search::QueryStyle;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Catalog CSV written by `scrape` and read by the other stages.
pub const CATALOG_CSV: &str = "musicas_realbook_completo.csv";

/// Annotated CSV written by `reconcile`.
pub const STATUS_CSV: &str = "musicas_com_status.csv";

/// Command-line arguments for the Realbook Clips pipeline.
///
/// # Examples
///
/// ```sh
/// # Scrape the songbook index into the catalog
/// realbook_clips scrape
///
/// # Download 40 second clips with 5 workers
/// realbook_clips download --workers 5
///
/// # See what is already downloaded
/// realbook_clips reconcile -o status.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape the songbook index into a CSV catalog
    Scrape(ScrapeArgs),
    /// Mark which catalog rows already have a downloaded clip
    Reconcile(ReconcileArgs),
    /// Search, download and trim a clip for every catalog row
    Download(DownloadArgs),
}

/// The two destination folders.
#[derive(Args, Debug, Clone)]
pub struct FolderArgs {
    /// Folder for clips found by title and author
    #[arg(long, default_value = FULL_MATCH_DIR)]
    pub full_dir: PathBuf,

    /// Folder for clips found by title alone
    #[arg(long, default_value = TITLE_ONLY_DIR)]
    pub title_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Index page of the songbook site
    #[arg(long, env = "REALBOOK_BASE_URL", default_value = BASE_URL)]
    pub base_url: String,

    /// Catalog CSV to write
    #[arg(short, long, default_value = CATALOG_CSV)]
    pub output: PathBuf,

    /// Pause between page requests, in milliseconds
    #[arg(long, default_value_t = PAGE_DELAY.as_millis() as u64)]
    pub delay_ms: u64,

    /// Log every link that could not be scraped
    #[arg(long)]
    pub show_failed: bool,
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Header-less catalog CSV (titulo, autor, ano)
    #[arg(short, long, default_value = CATALOG_CSV)]
    pub catalog: PathBuf,

    #[command(flatten)]
    pub folders: FolderArgs,

    /// Annotated CSV to write
    #[arg(short, long, default_value = STATUS_CSV)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Catalog CSV with a Titulo,Autor,Ano header
    #[arg(short, long, default_value = CATALOG_CSV)]
    pub catalog: PathBuf,

    #[command(flatten)]
    pub folders: FolderArgs,

    /// Number of rows processed at once
    #[arg(short, long, default_value_t = MAX_WORKERS)]
    pub workers: usize,

    /// Maximum clip length in seconds
    #[arg(long, default_value_t = CLIP_SECONDS)]
    pub clip_seconds: u64,

    /// Abort any single download larger than this many MiB
    #[arg(long, default_value_t = MAX_FILESIZE_MB)]
    pub max_filesize_mb: u64,

    /// Where per-row failures are written (truncated each run)
    #[arg(long, default_value = LOG_FILE)]
    pub log_file: PathBuf,

    /// How search queries are built from a row
    #[arg(long, value_enum, default_value_t = QueryStyle::Plain)]
    pub query_policy: QueryStyle,

    /// Pause before each row's search, in milliseconds
    #[arg(long, default_value_t = ROW_DELAY.as_millis() as u64)]
    pub delay_ms: u64,

    /// Network timeout for yt-dlp, in seconds
    #[arg(long, default_value_t = 30)]
    pub socket_timeout: u64,

    /// yt-dlp executable
    #[arg(long, env = "YT_DLP", default_value = "yt-dlp")]
    pub yt_dlp: PathBuf,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// ffprobe executable
    #[arg(long, env = "FFPROBE", default_value = "ffprobe")]
    pub ffprobe: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_need_no_flags() {
        let cli = Cli::parse_from(["realbook_clips", "download"]);
        let Command::Download(args) = cli.command else {
            panic!("expected download subcommand");
        };
        assert_eq!(args.catalog, PathBuf::from(CATALOG_CSV));
        assert_eq!(args.folders.full_dir, PathBuf::from("busca_completa"));
        assert_eq!(args.folders.title_dir, PathBuf::from("busca_por_titulo"));
        assert_eq!(args.workers, 4);
        assert_eq!(args.clip_seconds, 40);
        assert_eq!(args.query_policy, QueryStyle::Plain);
    }

    #[test]
    fn test_cli_reconcile_short_flags() {
        let cli = Cli::parse_from([
            "realbook_clips",
            "reconcile",
            "-c",
            "/tmp/catalog.csv",
            "-o",
            "/tmp/status.csv",
            "--full-dir",
            "/tmp/full",
        ]);
        let Command::Reconcile(args) = cli.command else {
            panic!("expected reconcile subcommand");
        };
        assert_eq!(args.catalog, PathBuf::from("/tmp/catalog.csv"));
        assert_eq!(args.output, PathBuf::from("/tmp/status.csv"));
        assert_eq!(args.folders.full_dir, PathBuf::from("/tmp/full"));
        assert_eq!(args.folders.title_dir, PathBuf::from("busca_por_titulo"));
    }

    #[test]
    fn test_cli_download_policy_and_workers() {
        let cli = Cli::parse_from([
            "realbook_clips",
            "download",
            "-w",
            "5",
            "--query-policy",
            "hyphenated",
        ]);
        let Command::Download(args) = cli.command else {
            panic!("expected download subcommand");
        };
        assert_eq!(args.workers, 5);
        assert_eq!(args.query_policy, QueryStyle::Hyphenated);
    }

    #[test]
    fn test_cli_scrape_defaults() {
        let cli = Cli::parse_from(["realbook_clips", "scrape", "--show-failed"]);
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape subcommand");
        };
        assert_eq!(args.output, PathBuf::from(CATALOG_CSV));
        assert_eq!(args.delay_ms, 50);
        assert!(args.show_failed);
    }
}
