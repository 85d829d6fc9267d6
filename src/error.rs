use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while ingesting burst records or rendering reports.
///
/// Per-field problems (a date that does not parse, a blank region) are not
/// errors; they degrade to `null` / `"Unknown"` and only show up in the
/// missing-data counters.
#[derive(Error, Debug)]
pub enum BurstError {
    /// The input could not be decoded as a table at all.
    #[error("Could not parse input: {0}")]
    Parse(String),

    /// The declared extension has no decoding path.
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// The input file could not be read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Analytics and report rendering need at least one record.
    #[error("raw_data must be a non-empty list of records")]
    MissingRawData,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, BurstError>;
