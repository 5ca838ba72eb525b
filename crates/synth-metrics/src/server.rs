//! HTTP endpoint serving the engine's metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::MetricsEngine;
use crate::error::{MetricError, Result};
use crate::exposition::CONTENT_TYPE;

/// Metrics server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

impl MetricsServerConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `METRICS_BIND_ADDRESS` (e.g. "127.0.0.1")
    /// - `METRICS_PORT` (e.g. "9100")
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(bind_address) = std::env::var("METRICS_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("METRICS_PORT")
            && let Ok(parsed) = port.trim().parse::<u16>()
        {
            config.port = parsed;
        }

        config
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let raw = format!("{}:{}", self.bind_address.trim(), self.port);
        raw.parse().map_err(|_| MetricError::InvalidAddress(raw))
    }
}

/// Serves `GET /metrics` until the cancellation token fires.
pub struct MetricsServer {
    config: MetricsServerConfig,
    engine: Arc<MetricsEngine>,
    cancel_token: CancellationToken,
}

impl MetricsServer {
    pub fn new(
        config: MetricsServerConfig,
        engine: Arc<MetricsEngine>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            engine,
            cancel_token,
        }
    }

    pub fn router(&self) -> Router {
        router(self.engine.clone())
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr()?;
        TcpListener::bind(addr)
            .await
            .map_err(|source| MetricError::Bind { addr, source })
    }

    /// Bind and serve; returns once the token is cancelled.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(
                metrics = self.engine.len(),
                "Metrics server listening on http://{}/metrics", addr
            );
        }

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("Metrics server shutting down...");
            })
            .await?;

        Ok(())
    }
}

pub fn router(engine: Arc<MetricsEngine>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(engine)
}

/// Scripts run on the blocking pool so a slow one does not stall the runtime.
async fn metrics_handler(State(engine): State<Arc<MetricsEngine>>) -> Response {
    match tokio::task::spawn_blocking(move || engine.render()).await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Metric evaluation task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
