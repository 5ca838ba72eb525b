use std::path::PathBuf;
use std::time::Duration;

use log_replay::ReplayOptions;
use synth_metrics::MetricsServerConfig;

use crate::cli::Args;

/// Everything a run needs, resolved from arguments and environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input: PathBuf,
    pub replay: ReplayOptions,
    pub metrics: MetricsServerConfig,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let replay = ReplayOptions::default()
            .with_filter(args.filter.as_str())
            .with_timestamp(args.time_regex.as_str(), args.time_format.as_str())
            .with_zone(args.time_zone)
            .with_loop(args.loop_replay)
            .with_batch_window(Duration::from_millis(args.batch_window_ms));

        let mut metrics = MetricsServerConfig::from_env_or_default();
        if let Some(bind_address) = &args.metrics_bind_address {
            metrics.bind_address = bind_address.clone();
        }
        if let Some(port) = args.metrics_port {
            metrics.port = port;
        }

        Self {
            input: args.input.clone(),
            replay,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use log_replay::LogZone;

    #[test]
    fn arguments_map_onto_replay_options() {
        let args = Args::try_parse_from([
            "logreplay",
            "--filter",
            "WARN|ERROR",
            "--time-regex",
            r"^\[(\d+:\d+:\d+)\]",
            "--time-format",
            "%H:%M:%S",
            "--time-zone",
            "local",
            "--batch-window-ms",
            "250",
            "--loop",
            "--metrics-bind-address",
            "127.0.0.1",
            "--metrics-port",
            "9300",
            "/var/log/app.log",
        ])
        .unwrap();

        let config = AppConfig::from_args(&args);
        assert_eq!(config.input, PathBuf::from("/var/log/app.log"));
        assert_eq!(config.replay.filter_pattern, "WARN|ERROR");
        assert_eq!(config.replay.timestamp_pattern, r"^\[(\d+:\d+:\d+)\]");
        assert_eq!(config.replay.timestamp_format, "%H:%M:%S");
        assert_eq!(config.replay.zone, LogZone::Local);
        assert_eq!(config.replay.batch_window, Duration::from_millis(250));
        assert!(config.replay.loop_replay);
        assert_eq!(config.metrics.bind_address, "127.0.0.1");
        assert_eq!(config.metrics.port, 9300);
    }
}
