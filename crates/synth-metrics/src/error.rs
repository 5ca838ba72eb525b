use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::metric::MetricKind;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Failed to create script runtime: {0}")]
    Runtime(String),

    #[error("Script for metric '{metric}' failed: {message}")]
    Script { metric: String, message: String },

    #[error("Metric '{metric}' ({kind}) returned an unsupported value: {found}")]
    UnexpectedValue {
        metric: String,
        kind: MetricKind,
        found: String,
    },

    #[error("Invalid metrics address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind metrics server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Metrics server error: {0}")]
    Serve(#[from] io::Error),
}

impl MetricError {
    pub(crate) fn script(metric: &str, message: impl Into<String>) -> Self {
        Self::Script {
            metric: metric.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricError>;
