use crate::error::{BurstError, Result};
use crate::types::{
    Analytics, BurstRecord, DailyTrends, DateRange, MissingData, OfficerGroup, OfficerPerformance,
    OfficerRow, PeriodRow, PipeSizeDistribution, PipeSizeRow, PipeSizeSummary, ProcessedData,
    RegionRow, RegionSummary, RegionalAnalysis, SummaryStats, UNKNOWN,
};
use crate::util::{percentage, Tally};
use std::collections::BTreeMap;
use tracing::debug;

const TOP_OFFICERS: usize = 10;

/// Derive every aggregate from a normalized, sorted table.
///
/// Pure: the same records always produce the same result, whether they came
/// straight from the loader or back from a serialized `raw_data`.
pub fn aggregate(records: Vec<BurstRecord>) -> ProcessedData {
    let grouped_data = group_by_officer(&records);
    let summary_stats = generate_summary_stats(&records);
    let region_summary = generate_region_summary(&records);
    let pipe_size_summary = generate_pipe_size_summary(&records);
    let monthly_trends = generate_monthly_trends(&records);
    debug!(
        "Aggregated {} records into {} officers, {} regions, {} pipe sizes",
        records.len(),
        grouped_data.len(),
        region_summary.len(),
        pipe_size_summary.len()
    );
    ProcessedData {
        total_records: records.len(),
        raw_data: records,
        grouped_data,
        summary_stats,
        region_summary,
        pipe_size_summary,
        monthly_trends,
    }
}

/// Partition `data` by `key`, keeping each partition in input order.
fn partition<'a, F>(data: &'a [BurstRecord], key: F) -> BTreeMap<&'a str, Vec<&'a BurstRecord>>
where
    F: Fn(&'a BurstRecord) -> &'a str,
{
    let mut map: BTreeMap<&str, Vec<&BurstRecord>> = BTreeMap::new();
    for r in data {
        map.entry(key(r)).or_default().push(r);
    }
    map
}

fn tally<'a, F>(rows: &[&'a BurstRecord], field: F) -> Tally
where
    F: Fn(&'a BurstRecord) -> &'a str,
{
    rows.iter().map(|&r| field(r)).collect()
}

pub fn group_by_officer(data: &[BurstRecord]) -> BTreeMap<String, OfficerGroup> {
    partition(data, |r| r.officer_name.as_str())
        .into_iter()
        .map(|(officer, rows)| {
            let pipes = tally(&rows, |r| r.pipe_size.as_str());
            let regions = tally(&rows, |r| r.region.as_str());
            let group = OfficerGroup {
                count: rows.len(),
                unique_regions: regions.distinct(),
                pipe_size_counts: pipes.ranked(),
                most_common_pipe_size: pipes.mode_or_unknown(),
                records: rows.into_iter().cloned().collect(),
            };
            (officer.to_string(), group)
        })
        .collect()
}

pub fn generate_region_summary(data: &[BurstRecord]) -> BTreeMap<String, RegionSummary> {
    partition(data, |r| r.region.as_str())
        .into_iter()
        .map(|(region, rows)| {
            let officers = tally(&rows, |r| r.officer_name.as_str());
            let pipes = tally(&rows, |r| r.pipe_size.as_str());
            let summary = RegionSummary {
                count: rows.len(),
                top_officer: officers.mode_or_unknown(),
                most_common_pipe_size: pipes.mode_or_unknown(),
                unique_officers: officers.distinct(),
            };
            (region.to_string(), summary)
        })
        .collect()
}

pub fn generate_pipe_size_summary(data: &[BurstRecord]) -> BTreeMap<String, PipeSizeSummary> {
    partition(data, |r| r.pipe_size.as_str())
        .into_iter()
        .map(|(pipe_size, rows)| {
            let summary = PipeSizeSummary {
                count: rows.len(),
                top_region: tally(&rows, |r| r.region.as_str()).mode_or_unknown(),
                top_officer: tally(&rows, |r| r.officer_name.as_str()).mode_or_unknown(),
            };
            (pipe_size.to_string(), summary)
        })
        .collect()
}

/// Incident counts per `YYYY-MM`. Records without a date are left out.
pub fn generate_monthly_trends(data: &[BurstRecord]) -> BTreeMap<String, usize> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for dt in data.iter().filter_map(|r| r.burst_date) {
        *months.entry(dt.format("%Y-%m").to_string()).or_insert(0) += 1;
    }
    months
}

pub fn generate_summary_stats(data: &[BurstRecord]) -> SummaryStats {
    let officers: Tally = data.iter().map(|r| r.officer_name.as_str()).collect();
    let regions: Tally = data.iter().map(|r| r.region.as_str()).collect();
    let pipes: Tally = data.iter().map(|r| r.pipe_size.as_str()).collect();

    let dates = data.iter().filter_map(|r| r.burst_date);
    let fmt_day = |d: Option<chrono::NaiveDateTime>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    let date_range = DateRange {
        start: fmt_day(dates.clone().min()),
        end: fmt_day(dates.max()),
    };

    let is_unknown = |v: &str| v == UNKNOWN;
    let missing_data = MissingData {
        // Officer names are defaulted during normalization, so no true nulls remain.
        officer_name: 0,
        burst_date: data.iter().filter(|r| r.burst_date.is_none()).count(),
        pipe_size: data.iter().filter(|r| is_unknown(&r.pipe_size)).count(),
        region: data.iter().filter(|r| is_unknown(&r.region)).count(),
        burst_location: data.iter().filter(|r| is_unknown(&r.burst_location)).count(),
    };

    let mut top_officers = officers.ranked();
    top_officers.truncate(TOP_OFFICERS);

    SummaryStats {
        total_bursts: data.len(),
        unique_officers: officers.distinct(),
        unique_regions: regions.distinct(),
        unique_pipe_sizes: pipes.distinct(),
        date_range,
        missing_data,
        top_officers,
        region_distribution: regions.ranked(),
        pipe_size_distribution: pipes.ranked(),
    }
}

/// Recompute visualization series from a previously produced `raw_data`.
///
/// Fails with [`BurstError::MissingRawData`] when there is nothing to analyze.
pub fn generate_analytics(raw_data: Option<&[BurstRecord]>) -> Result<Analytics> {
    let data = match raw_data {
        Some(d) if !d.is_empty() => d,
        _ => return Err(BurstError::MissingRawData),
    };

    let daily = daily_rows(data);
    let daily_trends = DailyTrends {
        dates: daily.iter().map(|r| r.period.clone()).collect(),
        counts: daily.iter().map(|r| r.total_bursts).collect(),
    };

    let officer_performance = officer_rows(&group_by_officer(data))
        .into_iter()
        .map(|row| OfficerPerformance {
            officer: row.officer,
            total_bursts: row.total_bursts,
            most_common_pipe_size: row.most_common_pipe_size,
        })
        .collect();

    let regional_analysis = region_rows(&generate_region_summary(data))
        .into_iter()
        .map(|row| RegionalAnalysis {
            region: row.region,
            total_bursts: row.total_bursts,
            unique_officers: row.unique_officers,
        })
        .collect();

    let pipes: Tally = data.iter().map(|r| r.pipe_size.as_str()).collect();
    let ranked = pipes.ranked();
    let pipe_size_analysis = PipeSizeDistribution {
        pipe_sizes: ranked.iter().map(|c| c.name.clone()).collect(),
        counts: ranked.iter().map(|c| c.count).collect(),
    };

    Ok(Analytics {
        daily_trends,
        officer_performance,
        regional_analysis,
        pipe_size_analysis,
    })
}

/// Sort rows by descending count; map iteration order breaks ties.
fn by_count_desc<T, F>(mut rows: Vec<T>, count: F) -> Vec<T>
where
    F: Fn(&T) -> usize,
{
    rows.sort_by(|a, b| count(b).cmp(&count(a)));
    rows
}

pub fn officer_rows(grouped: &BTreeMap<String, OfficerGroup>) -> Vec<OfficerRow> {
    let rows = grouped
        .iter()
        .map(|(officer, g)| OfficerRow {
            officer: officer.clone(),
            total_bursts: g.count,
            regions_covered: g.unique_regions,
            most_common_pipe_size: g.most_common_pipe_size.clone(),
        })
        .collect();
    by_count_desc(rows, |r: &OfficerRow| r.total_bursts)
}

pub fn region_rows(regions: &BTreeMap<String, RegionSummary>) -> Vec<RegionRow> {
    let rows = regions
        .iter()
        .map(|(region, s)| RegionRow {
            region: region.clone(),
            total_bursts: s.count,
            unique_officers: s.unique_officers,
            most_common_pipe_size: s.most_common_pipe_size.clone(),
        })
        .collect();
    by_count_desc(rows, |r: &RegionRow| r.total_bursts)
}

pub fn pipe_size_rows(pipes: &BTreeMap<String, PipeSizeSummary>) -> Vec<PipeSizeRow> {
    let total: usize = pipes.values().map(|s| s.count).sum();
    let rows = pipes
        .iter()
        .map(|(pipe_size, s)| PipeSizeRow {
            pipe_size: pipe_size.clone(),
            total_bursts: s.count,
            percentage: percentage(s.count, total),
            most_active_officer: s.top_officer.clone(),
        })
        .collect();
    by_count_desc(rows, |r: &PipeSizeRow| r.total_bursts)
}

/// Incidents per calendar day, ascending. Records without a date are skipped.
pub fn daily_rows(data: &[BurstRecord]) -> Vec<PeriodRow> {
    let mut days: BTreeMap<chrono::NaiveDate, usize> = BTreeMap::new();
    for dt in data.iter().filter_map(|r| r.burst_date) {
        *days.entry(dt.date()).or_insert(0) += 1;
    }
    days.into_iter()
        .map(|(day, total_bursts)| PeriodRow {
            period: day.format("%Y-%m-%d").to_string(),
            total_bursts,
        })
        .collect()
}

pub fn monthly_rows(trends: &BTreeMap<String, usize>) -> Vec<PeriodRow> {
    trends
        .iter()
        .map(|(month, total)| PeriodRow {
            period: month.clone(),
            total_bursts: *total,
        })
        .collect()
}
