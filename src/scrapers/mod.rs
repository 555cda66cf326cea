//! Songbook index scrapers.
//!
//! Each scraper follows the same two-phase pattern:
//!
//! 1. **Indexing**: Discover song detail-page URLs from the index page
//! 2. **Fetching**: Download each detail page and parse a [`CatalogRecord`]
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Real Book Site | [`realbook`] | HTML scraping | Alphabetical `letter-section` index |
//!
//! Scrapers use:
//! - Sequential fetching with a fixed politeness delay between requests
//! - Graceful error handling (failed pages are logged, counted, and skipped)
//!
//! [`CatalogRecord`]: crate::models::CatalogRecord

pub mod realbook;
