//! Spreadsheet report rendering.
//!
//! Consumes a [`ProcessedData`] and lays it out as an `.xlsx` workbook with
//! formatted tables and charts bound to the written cell ranges.

use crate::error::{BurstError, Result};
use crate::reports::{daily_rows, monthly_rows, officer_rows, pipe_size_rows, region_rows};
use crate::types::{PeriodRow, ProcessedData};
use crate::util::{format_int, format_number};
use chrono::Local;
use clap::ValueEnum;
use rust_xlsxwriter::{
    Chart, ChartType, Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet,
};
use std::path::{Path, PathBuf};
use tracing::info;

const HEADER_BLUE: u32 = 0x4472C4;
const TABLE_START_ROW: u32 = 4;
const TOP_OFFICERS_ON_SUMMARY: usize = 5;

/// Which report to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Six-sheet workbook with every table and chart.
    All,
    Officer,
    Date,
    Pipe,
    Region,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::All => "all",
            ReportKind::Officer => "officer",
            ReportKind::Date => "date",
            ReportKind::Pipe => "pipe",
            ReportKind::Region => "region",
        }
    }

    pub fn file_name(self, stamp: &str) -> String {
        match self {
            ReportKind::All => format!("burst_analysis_report_{stamp}.xlsx"),
            other => format!("burst_{}_report_{stamp}.xlsx", other.as_str()),
        }
    }
}

struct Formats {
    header: Format,
    cell: Format,
    number: Format,
    title: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_BLUE))
                .set_border(FormatBorder::Thin),
            cell: Format::new()
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Left),
            number: Format::new()
                .set_border(FormatBorder::Thin)
                .set_num_format("#,##0"),
            title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_align(FormatAlign::Center),
        }
    }
}

/// Build the workbook for `kind` in memory.
///
/// Fails with [`BurstError::MissingRawData`] when there are no records.
pub fn build_workbook(data: &ProcessedData, kind: ReportKind) -> Result<Workbook> {
    if data.raw_data.is_empty() {
        return Err(BurstError::MissingRawData);
    }
    let fmt = Formats::new();
    let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut workbook = Workbook::new();

    match kind {
        ReportKind::All => {
            summary_sheet(&mut workbook, data, &fmt, &generated)?;
            raw_data_sheet(&mut workbook, data, &fmt)?;
            officer_analysis_sheet(&mut workbook, data, &fmt)?;
            regional_analysis_sheet(&mut workbook, data, &fmt)?;
            pipe_size_analysis_sheet(&mut workbook, data, &fmt)?;
            charts_sheet(&mut workbook, data, &fmt)?;
        }
        ReportKind::Officer => {
            let rows: Vec<PeriodRow> = officer_rows(&data.grouped_data)
                .into_iter()
                .map(|r| PeriodRow { period: r.officer, total_bursts: r.total_bursts })
                .collect();
            let sheet = SingleSheet {
                name: "Officer Bursts Report",
                title: "OFFICER BURSTS ANALYSIS REPORT",
                label: "Officer Name",
                chart_type: ChartType::Column,
                series: "Bursts Fixed",
                chart_title: "Officer Performance - Bursts Fixed",
                axes: Some(("Officers", "Number of Bursts Fixed")),
            };
            single_sheet(&mut workbook, &sheet, &rows, &fmt, &generated)?;
        }
        ReportKind::Date => {
            let sheet = SingleSheet {
                name: "Date Bursts Report",
                title: "DATE-BASED BURSTS ANALYSIS REPORT",
                label: "Date",
                chart_type: ChartType::Line,
                series: "Daily Bursts",
                chart_title: "Daily Burst Incidents Over Time",
                axes: Some(("Date", "Number of Bursts")),
            };
            single_sheet(&mut workbook, &sheet, &daily_rows(&data.raw_data), &fmt, &generated)?;
        }
        ReportKind::Pipe => {
            let rows: Vec<PeriodRow> = pipe_size_rows(&data.pipe_size_summary)
                .into_iter()
                .map(|r| PeriodRow { period: r.pipe_size, total_bursts: r.total_bursts })
                .collect();
            let sheet = SingleSheet {
                name: "Pipe Size Bursts Report",
                title: "PIPE SIZE BURSTS ANALYSIS REPORT",
                label: "Pipe Size",
                chart_type: ChartType::Pie,
                series: "Pipe Size Distribution",
                chart_title: "Burst Distribution by Pipe Size",
                axes: None,
            };
            single_sheet(&mut workbook, &sheet, &rows, &fmt, &generated)?;
        }
        ReportKind::Region => {
            let rows: Vec<PeriodRow> = region_rows(&data.region_summary)
                .into_iter()
                .map(|r| PeriodRow { period: r.region, total_bursts: r.total_bursts })
                .collect();
            let sheet = SingleSheet {
                name: "Region Bursts Report",
                title: "REGIONAL BURSTS ANALYSIS REPORT",
                label: "Region",
                chart_type: ChartType::Column,
                series: "Regional Bursts",
                chart_title: "Burst Distribution by Region",
                axes: Some(("Region", "Number of Bursts")),
            };
            single_sheet(&mut workbook, &sheet, &rows, &fmt, &generated)?;
        }
    }
    Ok(workbook)
}

/// Render to an in-memory `.xlsx` buffer.
pub fn render_to_buffer(data: &ProcessedData, kind: ReportKind) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(data, kind)?;
    Ok(workbook.save_to_buffer()?)
}

/// Render into `dir` under a timestamped file name and return the path.
pub fn generate_report(data: &ProcessedData, kind: ReportKind, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let path = dir.join(kind.file_name(&stamp));
    let mut workbook = build_workbook(data, kind)?;
    workbook.save(&path)?;
    info!("Wrote {} report to {}", kind.as_str(), path.display());
    Ok(path)
}

fn write_headers(ws: &mut Worksheet, row: u32, headers: &[&str], fmt: &Formats) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        ws.write_string_with_format(row, col as u16, *header, &fmt.header)?;
    }
    Ok(())
}

fn write_count(ws: &mut Worksheet, row: u32, col: u16, n: usize, fmt: &Formats) -> Result<()> {
    ws.write_number_with_format(row, col, n as f64, &fmt.number)?;
    Ok(())
}

fn summary_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats, generated: &str) -> Result<()> {
    let ws = wb.add_worksheet().set_name("Summary")?;
    let stats = &data.summary_stats;

    ws.merge_range(0, 0, 0, 3, "BURST ANALYSIS SUMMARY REPORT", &fmt.title)?;
    ws.write_string(1, 0, format!("Generated on: {generated}"))?;

    let mut row = 4;
    write_headers(ws, row, &["OVERVIEW", ""], fmt)?;
    let overview = [
        ("Total Bursts", stats.total_bursts),
        ("Unique Officers", stats.unique_officers),
        ("Unique Regions", stats.unique_regions),
        ("Unique Pipe Sizes", stats.unique_pipe_sizes),
    ];
    for (label, value) in overview {
        row += 1;
        ws.write_string_with_format(row, 0, label, &fmt.cell)?;
        write_count(ws, row, 1, value, fmt)?;
    }
    row += 1;
    ws.write_string_with_format(row, 0, "Date Range", &fmt.cell)?;
    ws.write_string_with_format(
        row,
        1,
        format!("{} to {}", stats.date_range.start, stats.date_range.end),
        &fmt.cell,
    )?;

    row += 3;
    write_headers(ws, row, &["MISSING DATA", "Count"], fmt)?;
    for (field, count) in stats.missing_data.entries() {
        row += 1;
        ws.write_string_with_format(row, 0, title_case(field.as_str()), &fmt.cell)?;
        write_count(ws, row, 1, count, fmt)?;
    }

    row += 3;
    write_headers(ws, row, &["TOP OFFICERS", "Bursts Fixed"], fmt)?;
    for officer in stats.top_officers.iter().take(TOP_OFFICERS_ON_SUMMARY) {
        row += 1;
        ws.write_string_with_format(row, 0, &officer.name, &fmt.cell)?;
        write_count(ws, row, 1, officer.count, fmt)?;
    }

    ws.set_column_width(0, 20)?;
    ws.set_column_width(1, 15)?;
    Ok(())
}

fn raw_data_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats) -> Result<()> {
    let ws = wb.add_worksheet().set_name("Raw Data")?;
    write_headers(
        ws,
        0,
        &["Officer Name", "Burst Date", "Pipe Size", "Region", "Burst Location"],
        fmt,
    )?;
    for (idx, rec) in data.raw_data.iter().enumerate() {
        let row = idx as u32 + 1;
        let date = rec
            .burst_date
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        ws.write_string_with_format(row, 0, &rec.officer_name, &fmt.cell)?;
        ws.write_string_with_format(row, 1, date, &fmt.cell)?;
        ws.write_string_with_format(row, 2, &rec.pipe_size, &fmt.cell)?;
        ws.write_string_with_format(row, 3, &rec.region, &fmt.cell)?;
        ws.write_string_with_format(row, 4, &rec.burst_location, &fmt.cell)?;
    }
    for col in 0..5 {
        ws.set_column_width(col, 18)?;
    }
    Ok(())
}

fn officer_analysis_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats) -> Result<()> {
    let ws = wb.add_worksheet().set_name("Officer Analysis")?;
    write_headers(
        ws,
        0,
        &["Officer Name", "Total Bursts", "Regions Covered", "Most Common Pipe Size"],
        fmt,
    )?;
    for (idx, r) in officer_rows(&data.grouped_data).iter().enumerate() {
        let row = idx as u32 + 1;
        ws.write_string_with_format(row, 0, &r.officer, &fmt.cell)?;
        write_count(ws, row, 1, r.total_bursts, fmt)?;
        write_count(ws, row, 2, r.regions_covered, fmt)?;
        ws.write_string_with_format(row, 3, &r.most_common_pipe_size, &fmt.cell)?;
    }
    for col in 0..4 {
        ws.set_column_width(col, 20)?;
    }
    Ok(())
}

fn regional_analysis_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats) -> Result<()> {
    let ws = wb.add_worksheet().set_name("Regional Analysis")?;
    write_headers(
        ws,
        0,
        &["Region", "Total Bursts", "Unique Officers", "Most Common Pipe Size"],
        fmt,
    )?;
    for (idx, r) in region_rows(&data.region_summary).iter().enumerate() {
        let row = idx as u32 + 1;
        ws.write_string_with_format(row, 0, &r.region, &fmt.cell)?;
        write_count(ws, row, 1, r.total_bursts, fmt)?;
        write_count(ws, row, 2, r.unique_officers, fmt)?;
        ws.write_string_with_format(row, 3, &r.most_common_pipe_size, &fmt.cell)?;
    }
    for col in 0..4 {
        ws.set_column_width(col, 20)?;
    }
    Ok(())
}

fn pipe_size_analysis_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats) -> Result<()> {
    let ws = wb.add_worksheet().set_name("Pipe Size Analysis")?;
    write_headers(
        ws,
        0,
        &["Pipe Size", "Total Bursts", "Percentage", "Most Active Officer"],
        fmt,
    )?;
    for (idx, r) in pipe_size_rows(&data.pipe_size_summary).iter().enumerate() {
        let row = idx as u32 + 1;
        ws.write_string_with_format(row, 0, &r.pipe_size, &fmt.cell)?;
        write_count(ws, row, 1, r.total_bursts, fmt)?;
        ws.write_string_with_format(row, 2, format_percent(r.percentage), &fmt.cell)?;
        ws.write_string_with_format(row, 3, &r.most_active_officer, &fmt.cell)?;
    }
    for col in 0..4 {
        ws.set_column_width(col, 20)?;
    }
    Ok(())
}

/// Charts bound to the analysis sheets, plus a monthly table written here.
fn charts_sheet(wb: &mut Workbook, data: &ProcessedData, fmt: &Formats) -> Result<()> {
    let officers = data.grouped_data.len() as u32;
    let regions = data.region_summary.len() as u32;
    let pipes = data.pipe_size_summary.len() as u32;
    let months = monthly_rows(&data.monthly_trends);

    let ws = wb.add_worksheet().set_name("Charts")?;

    let mut officer_chart = Chart::new(ChartType::Column);
    officer_chart
        .add_series()
        .set_name("Officer Performance")
        .set_categories(("Officer Analysis", 1, 0, officers, 0))
        .set_values(("Officer Analysis", 1, 1, officers, 1));
    officer_chart.title().set_name("Officer Performance Chart");
    officer_chart.x_axis().set_name("Officers");
    officer_chart.y_axis().set_name("Bursts Fixed");
    officer_chart.set_width(600).set_height(400);
    ws.insert_chart(1, 0, &officer_chart)?;

    let mut region_chart = Chart::new(ChartType::Pie);
    region_chart
        .add_series()
        .set_name("Regional Distribution")
        .set_categories(("Regional Analysis", 1, 0, regions, 0))
        .set_values(("Regional Analysis", 1, 1, regions, 1));
    region_chart.title().set_name("Burst Distribution by Region");
    region_chart.set_width(600).set_height(400);
    ws.insert_chart(1, 10, &region_chart)?;

    let mut pipe_chart = Chart::new(ChartType::Bar);
    pipe_chart
        .add_series()
        .set_name("Pipe Sizes")
        .set_categories(("Pipe Size Analysis", 1, 0, pipes, 0))
        .set_values(("Pipe Size Analysis", 1, 1, pipes, 1));
    pipe_chart.title().set_name("Burst Distribution by Pipe Size");
    pipe_chart.x_axis().set_name("Number of Bursts");
    pipe_chart.set_width(600).set_height(400);
    ws.insert_chart(23, 0, &pipe_chart)?;

    // Monthly counts live on this sheet so the trend line has a range to bind to.
    let table_row = 45;
    write_headers(ws, table_row, &["Month", "Total Bursts"], fmt)?;
    for (idx, m) in months.iter().enumerate() {
        let row = table_row + 1 + idx as u32;
        ws.write_string_with_format(row, 0, &m.period, &fmt.cell)?;
        write_count(ws, row, 1, m.total_bursts, fmt)?;
    }
    if !months.is_empty() {
        let last = table_row + months.len() as u32;
        let mut trend_chart = Chart::new(ChartType::Line);
        trend_chart
            .add_series()
            .set_name("Monthly Bursts")
            .set_categories(("Charts", table_row + 1, 0, last, 0))
            .set_values(("Charts", table_row + 1, 1, last, 1));
        trend_chart.title().set_name("Monthly Burst Trend");
        trend_chart.x_axis().set_name("Month");
        trend_chart.y_axis().set_name("Number of Bursts");
        trend_chart.set_width(600).set_height(400);
        ws.insert_chart(23, 10, &trend_chart)?;
    }
    ws.set_column_width(0, 15)?;
    Ok(())
}

struct SingleSheet {
    name: &'static str,
    title: &'static str,
    label: &'static str,
    chart_type: ChartType,
    series: &'static str,
    chart_title: &'static str,
    axes: Option<(&'static str, &'static str)>,
}

/// Title, generation time, a two-column table at row 5 and a chart beside it.
fn single_sheet(
    wb: &mut Workbook,
    sheet: &SingleSheet,
    rows: &[PeriodRow],
    fmt: &Formats,
    generated: &str,
) -> Result<()> {
    let ws = wb.add_worksheet().set_name(sheet.name)?;
    ws.merge_range(0, 0, 0, 1, sheet.title, &fmt.title)?;
    ws.write_string(1, 0, format!("Generated on: {generated}"))?;
    write_headers(ws, TABLE_START_ROW, &[sheet.label, "Total Bursts"], fmt)?;

    for (idx, r) in rows.iter().enumerate() {
        let row = TABLE_START_ROW + 1 + idx as u32;
        ws.write_string_with_format(row, 0, &r.period, &fmt.cell)?;
        write_count(ws, row, 1, r.total_bursts, fmt)?;
    }
    ws.set_column_width(0, 25)?;
    ws.set_column_width(1, 15)?;

    if rows.is_empty() {
        return Ok(());
    }
    let first = TABLE_START_ROW + 1;
    let last = TABLE_START_ROW + rows.len() as u32;
    let mut chart = Chart::new(sheet.chart_type);
    chart
        .add_series()
        .set_name(sheet.series)
        .set_categories((sheet.name, first, 0, last, 0))
        .set_values((sheet.name, first, 1, last, 1));
    chart.title().set_name(sheet.chart_title);
    if let Some((x, y)) = sheet.axes {
        chart.x_axis().set_name(x);
        chart.y_axis().set_name(y);
    }
    chart.set_width(600).set_height(400);
    ws.insert_chart(TABLE_START_ROW, 3, &chart)?;
    info!("{}: {} rows charted", sheet.name, format_int(rows.len()));
    Ok(())
}

/// `66.666` → `"66.67%"`, with thousands separators on the integer part.
fn format_percent(pct: f64) -> String {
    format!("{}%", format_number(pct, 2))
}

/// `"burst_location"` → `"Burst Location"`.
fn title_case(field: &str) -> String {
    field
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
