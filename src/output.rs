use crate::error::Result;
use crate::reports::{monthly_rows, officer_rows, pipe_size_rows, region_rows};
use crate::types::ProcessedData;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the processed JSON plus one CSV per summary table into `dir`.
///
/// Returns the paths written, in a stable order.
pub fn export_tables(dir: &Path, data: &ProcessedData) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let json = dir.join("processed_data.json");
    write_json(&json, data)?;
    written.push(json);

    let officers = dir.join("officer_summary.csv");
    write_csv(&officers, &officer_rows(&data.grouped_data))?;
    written.push(officers);

    let regions = dir.join("region_summary.csv");
    write_csv(&regions, &region_rows(&data.region_summary))?;
    written.push(regions);

    let pipes = dir.join("pipe_size_summary.csv");
    write_csv(&pipes, &pipe_size_rows(&data.pipe_size_summary))?;
    written.push(pipes);

    let months = dir.join("monthly_trends.csv");
    write_csv(&months, &monthly_rows(&data.monthly_trends))?;
    written.push(months);

    info!("Exported {} files to {}", written.len(), dir.display());
    Ok(written)
}

/// Render up to `max_rows` rows as a markdown table; `None` when empty.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> Option<String>
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return None;
    }
    Some(Table::new(slice).with(Style::markdown()).to_string())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    match render_table(rows, max_rows) {
        Some(table) => println!("{}\n", table),
        None => println!("(no rows)\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::aggregate;
    use crate::types::{BurstRecord, PeriodRow};
    use tempfile::TempDir;

    fn record(officer: &str, region: &str) -> BurstRecord {
        BurstRecord {
            officer_name: officer.to_string(),
            burst_date: None,
            pipe_size: "6in".to_string(),
            region: region.to_string(),
            burst_location: "Unknown".to_string(),
        }
    }

    #[test]
    fn test_export_tables_writes_all_files() {
        let tmp = TempDir::new().expect("tempdir");
        let data = aggregate(vec![record("Alice", "North"), record("Bob", "South")]);
        let written = export_tables(tmp.path(), &data).expect("export");
        assert_eq!(written.len(), 5);
        for path in &written {
            assert!(path.is_file(), "{} must exist", path.display());
        }

        let officers = std::fs::read_to_string(tmp.path().join("officer_summary.csv")).unwrap();
        let mut lines = officers.lines();
        assert_eq!(
            lines.next(),
            Some("OfficerName,TotalBursts,RegionsCovered,MostCommonPipeSize")
        );
        assert_eq!(lines.next(), Some("Alice,1,1,6in"));

        let json = std::fs::read_to_string(tmp.path().join("processed_data.json")).unwrap();
        let back: ProcessedData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_render_table_limits_rows() {
        let rows: Vec<PeriodRow> = (1..=4)
            .map(|i| PeriodRow { period: format!("2024-0{}", i), total_bursts: i })
            .collect();
        let table = render_table(&rows, 2).unwrap();
        assert!(table.contains("2024-01"));
        assert!(table.contains("2024-02"));
        assert!(!table.contains("2024-03"));
        assert!(table.contains("Total Bursts"));
    }

    #[test]
    fn test_render_table_empty() {
        let rows: Vec<PeriodRow> = Vec::new();
        assert!(render_table(&rows, 5).is_none());
    }
}
