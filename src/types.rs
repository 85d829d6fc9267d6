use crate::util::{epoch_millis_to_datetime, parse_datetime_safe};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

/// Fallback for categorical fields that were blank or missing in the input.
pub const UNKNOWN: &str = "Unknown";

/// The five fields every input column is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OfficerName,
    BurstDate,
    PipeSize,
    Region,
    BurstLocation,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::OfficerName,
        CanonicalField::BurstDate,
        CanonicalField::PipeSize,
        CanonicalField::Region,
        CanonicalField::BurstLocation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::OfficerName => "officer_name",
            CanonicalField::BurstDate => "burst_date",
            CanonicalField::PipeSize => "pipe_size",
            CanonicalField::Region => "region",
            CanonicalField::BurstLocation => "burst_location",
        }
    }

    /// Substring rules, checked in priority order. A column lands on the first
    /// field whose keywords it contains.
    pub fn classify(cleaned_name: &str) -> Option<CanonicalField> {
        const RULES: [(CanonicalField, [&str; 2]); 5] = [
            (CanonicalField::OfficerName, ["officer", "name"]),
            (CanonicalField::BurstDate, ["date", "time"]),
            (CanonicalField::PipeSize, ["pipe", "size"]),
            (CanonicalField::Region, ["region", "area"]),
            (CanonicalField::BurstLocation, ["location", "address"]),
        ];
        let lower = cleaned_name.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(field, _)| *field)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipe-burst incident after normalization.
///
/// Deserialization is lenient so that `raw_data` can be round-tripped
/// through a JSON transport: blank categorical values come back as
/// `"Unknown"` and unreadable dates as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstRecord {
    #[serde(default = "unknown", deserialize_with = "de_category")]
    pub officer_name: String,
    #[serde(default, deserialize_with = "de_datetime")]
    pub burst_date: Option<NaiveDateTime>,
    #[serde(default = "unknown", deserialize_with = "de_category")]
    pub pipe_size: String,
    #[serde(default = "unknown", deserialize_with = "de_category")]
    pub region: String,
    #[serde(default = "unknown", deserialize_with = "de_category")]
    pub burst_location: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn de_category<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseValue>::deserialize(deserializer)?;
    let text = match value {
        Some(LooseValue::Text(s)) => s.trim().to_string(),
        Some(LooseValue::Int(i)) => i.to_string(),
        Some(LooseValue::Float(f)) if f.is_finite() => f.to_string(),
        Some(LooseValue::Bool(b)) => b.to_string(),
        Some(LooseValue::Float(_)) | None => String::new(),
    };
    Ok(if text.is_empty() { unknown() } else { text })
}

fn de_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(LooseValue::Text(s)) => parse_datetime_safe(Some(&s)),
        Some(LooseValue::Int(ms)) => epoch_millis_to_datetime(ms),
        _ => None,
    })
}

/// A value paired with how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerGroup {
    pub count: usize,
    pub unique_regions: usize,
    /// Pipe sizes by descending count.
    pub pipe_size_counts: Vec<CategoryCount>,
    pub most_common_pipe_size: String,
    pub records: Vec<BurstRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub count: usize,
    pub top_officer: String,
    pub most_common_pipe_size: String,
    pub unique_officers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeSizeSummary {
    pub count: usize,
    pub top_region: String,
    pub top_officer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Per-field missing counts. `burst_date` and `officer_name` count true
/// nulls, so `officer_name` stays 0 once rows are normalized; the other
/// categorical fields count the `"Unknown"` fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingData {
    pub officer_name: usize,
    pub burst_date: usize,
    pub pipe_size: usize,
    pub region: usize,
    pub burst_location: usize,
}

impl MissingData {
    pub fn entries(&self) -> [(CanonicalField, usize); 5] {
        [
            (CanonicalField::OfficerName, self.officer_name),
            (CanonicalField::BurstDate, self.burst_date),
            (CanonicalField::PipeSize, self.pipe_size),
            (CanonicalField::Region, self.region),
            (CanonicalField::BurstLocation, self.burst_location),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_bursts: usize,
    pub unique_officers: usize,
    pub unique_regions: usize,
    pub unique_pipe_sizes: usize,
    pub date_range: DateRange,
    pub missing_data: MissingData,
    pub top_officers: Vec<CategoryCount>,
    pub region_distribution: Vec<CategoryCount>,
    pub pipe_size_distribution: Vec<CategoryCount>,
}

/// Everything the aggregator derives from one normalized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub raw_data: Vec<BurstRecord>,
    pub grouped_data: BTreeMap<String, OfficerGroup>,
    pub summary_stats: SummaryStats,
    pub region_summary: BTreeMap<String, RegionSummary>,
    pub pipe_size_summary: BTreeMap<String, PipeSizeSummary>,
    pub monthly_trends: BTreeMap<String, usize>,
    pub total_records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrends {
    pub dates: Vec<String>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerPerformance {
    pub officer: String,
    pub total_bursts: usize,
    pub most_common_pipe_size: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalAnalysis {
    pub region: String,
    pub total_bursts: usize,
    pub unique_officers: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeSizeDistribution {
    pub pipe_sizes: Vec<String>,
    pub counts: Vec<usize>,
}

/// Visualization-oriented series recomputed from a `raw_data` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub daily_trends: DailyTrends,
    pub officer_performance: Vec<OfficerPerformance>,
    pub regional_analysis: Vec<RegionalAnalysis>,
    pub pipe_size_analysis: PipeSizeDistribution,
}

/// Input of the analytics entry point: any object carrying `raw_data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsRequest {
    #[serde(default)]
    pub raw_data: Option<Vec<BurstRecord>>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct OfficerRow {
    #[serde(rename = "OfficerName")]
    #[tabled(rename = "Officer Name")]
    pub officer: String,
    #[serde(rename = "TotalBursts")]
    #[tabled(rename = "Total Bursts")]
    pub total_bursts: usize,
    #[serde(rename = "RegionsCovered")]
    #[tabled(rename = "Regions Covered")]
    pub regions_covered: usize,
    #[serde(rename = "MostCommonPipeSize")]
    #[tabled(rename = "Most Common Pipe Size")]
    pub most_common_pipe_size: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RegionRow {
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "TotalBursts")]
    #[tabled(rename = "Total Bursts")]
    pub total_bursts: usize,
    #[serde(rename = "UniqueOfficers")]
    #[tabled(rename = "Unique Officers")]
    pub unique_officers: usize,
    #[serde(rename = "MostCommonPipeSize")]
    #[tabled(rename = "Most Common Pipe Size")]
    pub most_common_pipe_size: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PipeSizeRow {
    #[serde(rename = "PipeSize")]
    #[tabled(rename = "Pipe Size")]
    pub pipe_size: String,
    #[serde(rename = "TotalBursts")]
    #[tabled(rename = "Total Bursts")]
    pub total_bursts: usize,
    #[serde(rename = "Percentage")]
    #[tabled(rename = "Percentage")]
    pub percentage: f64,
    #[serde(rename = "MostActiveOfficer")]
    #[tabled(rename = "Most Active Officer")]
    pub most_active_officer: String,
}

/// Two-column count row used for daily and monthly series.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct PeriodRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "TotalBursts")]
    #[tabled(rename = "Total Bursts")]
    pub total_bursts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_priority() {
        assert_eq!(CanonicalField::classify("officer_name"), Some(CanonicalField::OfficerName));
        assert_eq!(CanonicalField::classify("burst_date"), Some(CanonicalField::BurstDate));
        assert_eq!(CanonicalField::classify("repair_time"), Some(CanonicalField::BurstDate));
        assert_eq!(CanonicalField::classify("pipe_size"), Some(CanonicalField::PipeSize));
        assert_eq!(CanonicalField::classify("fix_area"), Some(CanonicalField::Region));
        assert_eq!(CanonicalField::classify("location"), Some(CanonicalField::BurstLocation));
        assert_eq!(CanonicalField::classify("street_address"), Some(CanonicalField::BurstLocation));
        // "name" outranks "region".
        assert_eq!(CanonicalField::classify("region_name"), Some(CanonicalField::OfficerName));
        assert_eq!(CanonicalField::classify("tech"), None);
    }

    #[test]
    fn test_burst_record_lenient_deserialize() {
        let json = r#"{
            "officer_name": null,
            "burst_date": "2024-02-10T00:00:00",
            "pipe_size": 6,
            "region": "  ",
            "extra": "ignored"
        }"#;
        let rec: BurstRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.officer_name, "Unknown");
        assert_eq!(
            rec.burst_date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-02-10"
        );
        assert_eq!(rec.pipe_size, "6");
        assert_eq!(rec.region, "Unknown");
        assert_eq!(rec.burst_location, "Unknown");
    }

    #[test]
    fn test_burst_record_bad_date_becomes_none() {
        let json = r#"{"officer_name": "Bob", "burst_date": "NaT"}"#;
        let rec: BurstRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.officer_name, "Bob");
        assert_eq!(rec.burst_date, None);
    }

    #[test]
    fn test_burst_record_serializes_iso_date() {
        let rec = BurstRecord {
            officer_name: "Alice".into(),
            burst_date: parse_datetime_safe(Some("2024-01-05")),
            pipe_size: "6in".into(),
            region: "North".into(),
            burst_location: "Main St".into(),
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["burst_date"], "2024-01-05T00:00:00");
        let back: BurstRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, rec);
    }
}
