// Entry point and high-level CLI flow.
//
// `process` loads and normalizes the input, prints diagnostics and previews,
// then writes the JSON/CSV exports and the spreadsheet report.
// `analytics` re-derives chart series from a previously written JSON export.
use anyhow::{Context, Result};
use burst_report::output::{export_tables, preview_table_rows};
use burst_report::reports::{monthly_rows, officer_rows, pipe_size_rows, region_rows};
use burst_report::settings::{AnalyticsArgs, Command, ProcessArgs, Settings};
use burst_report::util::format_int;
use burst_report::{bootstrap, output, workbook};
use clap::Parser;

/// Handle `process`: run the pipeline and write every output.
fn handle_process(args: &ProcessArgs) -> Result<()> {
    let (data, load_report) = burst_report::process_file(&args.input)
        .with_context(|| format!("processing {}", args.input.display()))?;

    println!(
        "Processing dataset... ({} rows loaded, {} officers)",
        format_int(load_report.total_rows),
        format_int(data.grouped_data.len())
    );
    for (source, field) in &load_report.mapped_columns {
        println!("  column '{}' -> {}", source, field);
    }
    if !load_report.dropped_columns.is_empty() {
        println!("Note: ignored columns: {}", load_report.dropped_columns.join(", "));
    }
    if !load_report.ambiguous_columns.is_empty() {
        let names: Vec<&str> = load_report
            .ambiguous_columns
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        println!("Note: duplicate matches ignored: {}", names.join(", "));
    }
    if load_report.unparsed_dates > 0 {
        println!(
            "Note: {} burst dates could not be parsed and were left empty.",
            format_int(load_report.unparsed_dates)
        );
    }
    println!();

    let stats = &data.summary_stats;
    println!(
        "Summary: {} bursts, {} officers, {} regions, {} pipe sizes ({} to {})\n",
        format_int(stats.total_bursts),
        format_int(stats.unique_officers),
        format_int(stats.unique_regions),
        format_int(stats.unique_pipe_sizes),
        stats.date_range.start,
        stats.date_range.end
    );

    println!("Officer Performance\n");
    preview_table_rows(&officer_rows(&data.grouped_data), args.preview_rows);
    println!("Regional Summary\n");
    preview_table_rows(&region_rows(&data.region_summary), args.preview_rows);
    println!("Pipe Size Summary\n");
    preview_table_rows(&pipe_size_rows(&data.pipe_size_summary), args.preview_rows);
    println!("Monthly Trends\n");
    preview_table_rows(&monthly_rows(&data.monthly_trends), args.preview_rows);

    let written = export_tables(&args.output_dir, &data)?;
    for path in &written {
        println!("(exported {})", path.display());
    }

    if args.no_workbook {
        return Ok(());
    }
    if data.raw_data.is_empty() {
        println!("No records to report on; skipping the workbook.");
        return Ok(());
    }
    let path = workbook::generate_report(&data, args.report, &args.output_dir)?;
    println!("Report saved to {}", path.display());
    Ok(())
}

/// Handle `analytics`: recompute series from a JSON export.
fn handle_analytics(args: &AnalyticsArgs) -> Result<()> {
    let json = std::fs::read_to_string(&args.data)
        .with_context(|| format!("reading {}", args.data.display()))?;
    let analytics = burst_report::analytics_from_json(&json)?;
    match &args.output {
        Some(path) => {
            output::write_json(path, &analytics)?;
            println!("Analytics saved to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&analytics)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let settings = Settings::parse();
    bootstrap::setup_logging(&settings.log_level)?;
    tracing::info!("burst-report v{} starting", env!("CARGO_PKG_VERSION"));

    match &settings.command {
        Command::Process(args) => handle_process(args),
        Command::Analytics(args) => handle_analytics(args),
    }
}
