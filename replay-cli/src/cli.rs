use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use log_replay::{DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TIMESTAMP_PATTERN, LogZone};

#[derive(Parser, Debug)]
#[command(
    name = "logreplay",
    author,
    version,
    about = "Replay a log file in real time with rewritten timestamps",
    long_about = "Reads a log file and writes its lines to stdout with the same relative \
                  delays they originally had, rewriting each timestamp to the current time.\n\n\
                  Synthetic Prometheus metrics can be served alongside the replay by defining \
                  METRIC_<NAME>_EXPR environment variables."
)]
pub struct Args {
    /// Log file to replay
    #[arg(value_name = "FILE", env = "INPUT_FILE")]
    pub input: PathBuf,

    /// Only replay lines matching this regular expression
    #[arg(short, long, env = "FILTER_REGEX", default_value = ".*")]
    pub filter: String,

    /// Regular expression with exactly one capture group around the timestamp
    #[arg(long, env = "TIME_REGEX", default_value = DEFAULT_TIMESTAMP_PATTERN)]
    pub time_regex: String,

    /// strftime-style format of the captured timestamp
    #[arg(long, env = "TIME_FORMAT", default_value = DEFAULT_TIMESTAMP_FORMAT)]
    pub time_format: String,

    /// Zone for timestamps without an explicit offset (utc or local)
    #[arg(long, env = "TIME_ZONE", default_value = "utc")]
    pub time_zone: LogZone,

    /// Start over from the first line after reaching the end of the file
    #[arg(
        short = 'l',
        long = "loop",
        env = "LOOP_REPLAY",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub loop_replay: bool,

    /// Lines within this many milliseconds of each other are released together
    #[arg(long, env = "BATCH_WINDOW_MS", default_value_t = 500)]
    pub batch_window_ms: u64,

    /// Metrics server bind address (overrides METRICS_BIND_ADDRESS)
    #[arg(long)]
    pub metrics_bind_address: Option<String>,

    /// Metrics server port (overrides METRICS_PORT)
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Log format written to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_apply_when_only_the_file_is_given() {
        let args = Args::try_parse_from(["logreplay", "app.log"]).unwrap();
        assert_eq!(args.input, PathBuf::from("app.log"));
        assert_eq!(args.filter, ".*");
        assert_eq!(args.time_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(args.time_zone, LogZone::Utc);
        assert_eq!(args.batch_window_ms, 500);
        assert!(!args.loop_replay);
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn flags_and_options_parse() {
        let args = Args::try_parse_from([
            "logreplay",
            "--loop",
            "--filter",
            "ERROR",
            "--time-zone",
            "local",
            "--batch-window-ms",
            "1000",
            "--metrics-port",
            "9200",
            "app.log",
        ])
        .unwrap();
        assert!(args.loop_replay);
        assert_eq!(args.filter, "ERROR");
        assert_eq!(args.time_zone, LogZone::Local);
        assert_eq!(args.batch_window_ms, 1000);
        assert_eq!(args.metrics_port, Some(9200));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["logreplay", "-v", "-q", "app.log"]).is_err());
    }

    #[test]
    fn unknown_zone_is_rejected() {
        assert!(Args::try_parse_from(["logreplay", "--time-zone", "mars", "app.log"]).is_err());
    }
}
