//! Data Import
//!
//! - Menu items from CSV (header row, quoted fields, semicolon-separated tags)
//! - A single-line quoted CSV field splitter

mod menu_csv;

pub use menu_csv::{split_csv_line, MenuCsvImporter, MenuImportResult, MenuItem};

/// Errors that can occur during import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("CSV has no header row")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
