use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a user-supplied level name onto a tracing filter directive.
///
/// `WARNING` and `CRITICAL` are accepted as aliases; anything unrecognised is
/// passed through to `EnvFilter` as a directive.
pub fn normalise_level(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARN" | "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        "TRACE" => "trace".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber; output goes to stderr.
///
/// Falls back to `"info"` if the level string is not a valid filter.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(normalise_level(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(layer).try_init()?;
    Ok(())
}
