use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::LogFormat;
use crate::error::{AppError, Result};

/// Install the global subscriber. Logs go to stderr; stdout carries only
/// replayed lines.
pub fn init_logging(verbose: bool, quiet: bool, format: LogFormat) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "logreplay={level},log_replay={level},synth_metrics={level}"
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| AppError::Logging(e.to_string()))
}
