mod cli;
mod config;
mod error;
mod logging;
mod output;

use std::io;
use std::process;
use std::sync::Arc;

use clap::Parser;
use log_replay::LogReplayer;
use synth_metrics::{MetricError, MetricsEngineBuilder, MetricsServer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    cli::Args,
    config::AppConfig,
    error::{AppError, Result},
    logging::init_logging,
    output::LineSink,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet, args.log_format) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        if e.is_config() {
            error!("Invalid configuration: {}", e);
        } else {
            error!("Application error: {}", e);
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::from_args(&args);
    let token = CancellationToken::new();

    tokio::spawn(cancel_on_signal(token.clone()));
    let metrics = spawn_metrics_server(&config, token.clone());

    let replayer = LogReplayer::new(&config.input, config.replay.clone());
    let mut sink = LineSink::stdout(token.clone());
    let replayed = replayer
        .run(token.clone(), |line| sink.write_line(&line))
        .await;

    // Replay is over either way; stop the metrics server too.
    token.cancel();
    let served = match metrics {
        Some(handle) => handle
            .await
            .map_err(AppError::from)
            .and_then(|r| r.map_err(AppError::from)),
        None => Ok(()),
    };

    let stats = replayed?;
    if let Err(e) = sink.finish()
        && e.kind() != io::ErrorKind::BrokenPipe
    {
        return Err(e.into());
    }
    served?;

    info!(
        passes = stats.passes,
        emitted = stats.lines_emitted,
        cancelled = stats.cancelled,
        "Done"
    );
    Ok(())
}

/// Start the metrics endpoint if any `METRIC_*` definitions are present.
///
/// A server failure cancels the replay so the process exits with an error.
fn spawn_metrics_server(
    config: &AppConfig,
    token: CancellationToken,
) -> Option<JoinHandle<std::result::Result<(), MetricError>>> {
    let engine = MetricsEngineBuilder::from_env().build();
    if engine.is_empty() {
        info!("No metrics configured, metrics server disabled");
        return None;
    }

    let server = MetricsServer::new(config.metrics.clone(), Arc::new(engine), token.clone());
    Some(tokio::spawn(async move {
        let result = server.run().await;
        if let Err(e) = &result {
            error!(error = %e, "Metrics server stopped");
            token.cancel();
        }
        result
    }))
}

async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping replay");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Unable to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
