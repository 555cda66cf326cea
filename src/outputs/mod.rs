//! CSV input and output for the catalog files.
//!
//! The CSV files are the only persisted state in the pipeline. Every stage
//! reads them whole and rewrites its output whole.
//!
//! # Submodules
//!
//! - [`catalog`]: Reads and writes the scraped catalog and the annotated
//!   catalog produced by the reconciler
//!
//! # File Layout
//!
//! ```text
//! musicas_realbook_completo.csv   # Titulo,Autor,Ano (written by `scrape`)
//! musicas_com_status.csv          # titulo,autor,ano,status,busca (written by `reconcile`)
//! ```

pub mod catalog;
