//! # Synthetic Metrics
//!
//! Metrics whose values are computed by small JavaScript snippets from the
//! time elapsed since startup, exposed in the Prometheus text format. Useful
//! next to a log replay to give dashboards something that moves.
//!
//! ```ignore
//! use synth_metrics::{MetricsEngineBuilder, MetricsServer, MetricsServerConfig};
//!
//! // METRIC_REQUESTS_EXPR="Math.floor(t / 100)" METRIC_REQUESTS_TYPE=counter
//! let engine = MetricsEngineBuilder::from_env().build();
//! let server = MetricsServer::new(
//!     MetricsServerConfig::from_env_or_default(),
//!     Arc::new(engine),
//!     token.clone(),
//! );
//! server.run().await?;
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod exposition;
pub mod metric;
pub mod server;

pub use builder::{METRIC_ENV_PREFIX, MetricsEngineBuilder};
pub use engine::MetricsEngine;
pub use error::{MetricError, Result};
pub use evaluator::{JsEvaluator, ScriptEvaluator};
pub use exposition::CONTENT_TYPE;
pub use metric::{Metric, MetricBuilder, MetricKind, MetricValue};
pub use server::{MetricsServer, MetricsServerConfig};
