//! Metric evaluation against a shared start time.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::evaluator::ScriptEvaluator;
use crate::exposition::write_metric;
use crate::metric::{Metric, MetricValue};

/// Holds the configured metrics and evaluates them on demand.
///
/// Scripts see `t` as the milliseconds elapsed since the engine was created
/// or last [`reset`](Self::reset).
pub struct MetricsEngine {
    metrics: Vec<Metric>,
    evaluator: Box<dyn ScriptEvaluator>,
    started: Mutex<Instant>,
}

impl MetricsEngine {
    pub fn new(metrics: Vec<Metric>, evaluator: impl ScriptEvaluator + 'static) -> Self {
        Self {
            metrics,
            evaluator: Box::new(evaluator),
            started: Mutex::new(Instant::now()),
        }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Restart the script clock at zero.
    pub fn reset(&self) {
        *self.started.lock() = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.lock().elapsed()
    }

    pub fn evaluate(&self, metric: &Metric) -> Result<MetricValue> {
        let elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.evaluator.evaluate(metric, elapsed_ms)
    }

    /// Evaluate every metric and render the exposition text.
    ///
    /// A metric whose script fails is left out of this scrape.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for metric in &self.metrics {
            match self.evaluate(metric) {
                Ok(value) => write_metric(&mut output, metric, &value),
                Err(e) => warn!(metric = metric.name(), error = %e, "Skipping metric"),
            }
        }
        output
    }
}

impl fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("metrics", &self.metrics)
            .field("started", &*self.started.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;
    use crate::metric::MetricBuilder;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Returns the elapsed time it was given, or fails for metrics named `broken`.
    #[derive(Default)]
    struct Recording {
        last_elapsed: Arc<AtomicU64>,
    }

    impl ScriptEvaluator for Recording {
        fn evaluate(&self, metric: &Metric, elapsed_ms: u64) -> Result<MetricValue> {
            self.last_elapsed.store(elapsed_ms, Ordering::SeqCst);
            if metric.name() == "broken" {
                return Err(MetricError::script(metric.name(), "boom"));
            }
            Ok(MetricValue::Scalar(7.0))
        }
    }

    fn metric(name: &str) -> Metric {
        MetricBuilder::new(name).with_script("t").build().unwrap()
    }

    #[test]
    fn failing_metrics_are_skipped() {
        let engine = MetricsEngine::new(
            vec![metric("alpha"), metric("broken"), metric("omega")],
            Recording::default(),
        );
        let output = engine.render();
        assert!(output.contains("alpha 7\n"));
        assert!(output.contains("omega 7\n"));
        assert!(!output.contains("broken"));
    }

    #[test]
    fn reset_restarts_the_script_clock() {
        let last_elapsed = Arc::new(AtomicU64::new(u64::MAX));
        let engine = MetricsEngine::new(
            vec![metric("alpha")],
            Recording {
                last_elapsed: last_elapsed.clone(),
            },
        );
        std::thread::sleep(Duration::from_millis(20));
        engine.render();
        assert!(last_elapsed.load(Ordering::SeqCst) >= 20);

        engine.reset();
        engine.render();
        assert!(last_elapsed.load(Ordering::SeqCst) < 20);
    }

    #[test]
    fn empty_engine_renders_nothing() {
        let engine = MetricsEngine::new(Vec::new(), Recording::default());
        assert!(engine.is_empty());
        assert_eq!(engine.render(), "");
    }
}
