//! Pipe-burst incident analysis.
//!
//! Reads a spreadsheet of burst records, normalizes it onto five canonical
//! fields, and derives per-officer, per-region, per-pipe-size and monthly
//! aggregates that the report renderers consume.

pub mod bootstrap;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod settings;
pub mod types;
pub mod util;
pub mod workbook;

use std::path::Path;

pub use error::{BurstError, Result};
pub use loader::LoadReport;
pub use types::{Analytics, AnalyticsRequest, BurstRecord, ProcessedData};

/// Decode, normalize and aggregate one table held in memory.
///
/// `extension` selects the decoder (`xlsx`, `xls`, `csv`, ...).
pub fn process_bytes(bytes: &[u8], extension: &str) -> Result<(ProcessedData, LoadReport)> {
    let (records, report) = loader::load_and_clean(bytes, extension)?;
    Ok((reports::aggregate(records), report))
}

/// Read `path` and run the whole pipeline on it.
pub fn process_file(path: &Path) -> Result<(ProcessedData, LoadReport)> {
    let bytes = std::fs::read(path).map_err(|source| BurstError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    process_bytes(&bytes, &extension)
}

/// Re-derive analytics from a transport-encoded `raw_data` payload.
pub fn analytics_from_json(json: &str) -> Result<Analytics> {
    let request: AnalyticsRequest = serde_json::from_str(json)?;
    let mut records = request.raw_data.ok_or(BurstError::MissingRawData)?;
    loader::sort_records(&mut records);
    reports::generate_analytics(Some(records.as_slice()))
}
