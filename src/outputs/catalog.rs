//! Catalog CSV serialization.
//!
//! Two shapes of catalog are read:
//! - **Headered** (`Titulo,Autor,Ano`), as written by the scraper and read by
//!   the downloader
//! - **Positional** (`titulo,autor,ano` by column index), as read by the
//!   reconciler; missing or unparseable cells become empty strings
//!
//! Files are read and written whole through `tokio::fs`; the `csv` crate only
//! ever sees in-memory buffers.

use crate::error::PipelineError;
use crate::models::{AnnotatedRecord, CatalogRecord};
use serde::Serialize;
use std::borrow::Cow;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

const HEADER: [&str; 3] = ["titulo", "autor", "ano"];

async fn read_existing(path: &Path) -> Result<Vec<u8>, Box<dyn Error>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(PipelineError::CatalogNotFound(path.to_path_buf()).into());
    }
    Ok(fs::read(path).await?)
}

async fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    fs::write(path, bytes).await?;
    Ok(())
}

/// Write the scraped catalog with a `Titulo,Autor,Ano` header.
#[instrument(level = "info", skip(records), fields(path = %path.display(), count = records.len()))]
pub async fn write_catalog(path: &Path, records: &[CatalogRecord]) -> Result<(), Box<dyn Error>> {
    write_rows(path, records).await?;
    info!("Wrote catalog CSV");
    Ok(())
}

/// Read a catalog that has a `Titulo,Autor,Ano` header.
///
/// # Errors
///
/// Fails if the file is missing or any row cannot be decoded.
#[instrument(level = "info", fields(path = %path.display()))]
pub async fn read_catalog(path: &Path) -> Result<Vec<CatalogRecord>, Box<dyn Error>> {
    let bytes = read_existing(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let mut records = Vec::new();
    for row in reader.deserialize::<CatalogRecord>() {
        let row = row?;
        records.push(CatalogRecord::new(row.title, row.author.as_deref(), row.year.as_deref()));
    }
    info!(count = records.len(), "Loaded catalog");
    Ok(records)
}

/// Read a header-less catalog by column position.
///
/// Short rows, undecodable rows and invalid UTF-8 degrade to empty strings
/// instead of failing. A leading `Titulo,Autor,Ano` header row (any case) is
/// skipped so a scraper-written file can be fed in directly.
#[instrument(level = "info", fields(path = %path.display()))]
pub async fn read_catalog_positional(path: &Path) -> Result<Vec<CatalogRecord>, Box<dyn Error>> {
    let bytes = read_existing(path).await?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut records = Vec::new();
    for (i, row) in reader.byte_records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(row = i, error = %e, "Unreadable catalog row; using empty fields");
                csv::ByteRecord::new()
            }
        };
        let (title, author, year) = (cell(&row, 0), cell(&row, 1), cell(&row, 2));

        if i == 0 && is_header([&*title, &*author, &*year]) {
            continue;
        }
        records.push(CatalogRecord::new(&*title, Some(&*author), Some(&*year)));
    }
    info!(count = records.len(), "Loaded positional catalog");
    Ok(records)
}

fn cell(row: &csv::ByteRecord, idx: usize) -> Cow<'_, str> {
    row.get(idx)
        .map(String::from_utf8_lossy)
        .unwrap_or(Cow::Borrowed(""))
}

fn is_header(cells: [&str; 3]) -> bool {
    cells
        .iter()
        .zip(HEADER)
        .all(|(cell, expected)| cell.trim().eq_ignore_ascii_case(expected))
}

/// Write the reconciled catalog with a `titulo,autor,ano,status,busca` header.
#[instrument(level = "info", skip(rows), fields(path = %path.display(), count = rows.len()))]
pub async fn write_annotated(path: &Path, rows: &[AnnotatedRecord]) -> Result<(), Box<dyn Error>> {
    write_rows(path, rows).await?;
    info!("Wrote annotated CSV");
    Ok(())
}
