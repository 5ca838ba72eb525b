use log_replay::ReplayError;
use synth_metrics::MetricError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    /// Errors caused by bad arguments or environment rather than the runtime.
    pub fn is_config(&self) -> bool {
        match self {
            AppError::Replay(e) => e.is_config(),
            AppError::Metrics(MetricError::InvalidAddress(_)) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
