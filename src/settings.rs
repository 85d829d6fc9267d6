use crate::workbook::ReportKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Analyze pipe-burst incident spreadsheets and produce summary reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "burst-report",
    about = "Analyze pipe-burst incident spreadsheets and produce summary reports",
    version
)]
pub struct Settings {
    /// Logging level
    #[arg(long, global = true, env = "BURST_REPORT_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest a spreadsheet, print summaries and write reports
    Process(ProcessArgs),
    /// Recompute analytics from a previously written processed_data.json
    Analytics(AnalyticsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Input file (.xlsx, .xlsm, .xlsb, .xls, .ods or .csv)
    pub input: PathBuf,

    /// Directory for the JSON, CSV and workbook outputs
    #[arg(long, env = "BURST_REPORT_OUTPUT_DIR", default_value = "reports")]
    pub output_dir: PathBuf,

    /// Which workbook report to render
    #[arg(long, value_enum, default_value_t = ReportKind::All)]
    pub report: ReportKind,

    /// Skip the .xlsx report
    #[arg(long)]
    pub no_workbook: bool,

    /// Rows shown in each console preview table
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyticsArgs {
    /// JSON document containing a `raw_data` array
    pub data: PathBuf,

    /// Write the analytics JSON here instead of printing it
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Settings::command().debug_assert();
    }

    #[test]
    fn test_process_defaults() {
        let s = Settings::try_parse_from(["burst-report", "process", "bursts.xlsx"]).unwrap();
        assert_eq!(s.log_level, "info");
        let Command::Process(args) = s.command else {
            panic!("expected process subcommand");
        };
        assert_eq!(args.input, PathBuf::from("bursts.xlsx"));
        assert_eq!(args.output_dir, PathBuf::from("reports"));
        assert_eq!(args.report, ReportKind::All);
        assert!(!args.no_workbook);
        assert_eq!(args.preview_rows, 5);
    }

    #[test]
    fn test_process_flags() {
        let s = Settings::try_parse_from([
            "burst-report",
            "process",
            "in.csv",
            "--report",
            "pipe",
            "--no-workbook",
            "--output-dir",
            "out",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(s.log_level, "debug");
        let Command::Process(args) = s.command else {
            panic!("expected process subcommand");
        };
        assert_eq!(args.report, ReportKind::Pipe);
        assert!(args.no_workbook);
        assert_eq!(args.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_analytics_subcommand() {
        let s = Settings::try_parse_from(["burst-report", "analytics", "processed_data.json"])
            .unwrap();
        let Command::Analytics(args) = s.command else {
            panic!("expected analytics subcommand");
        };
        assert_eq!(args.data, PathBuf::from("processed_data.json"));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_rejects_unknown_report_kind() {
        let res = Settings::try_parse_from(["burst-report", "process", "a.xlsx", "--report", "pdf"]);
        assert!(res.is_err());
    }
}
