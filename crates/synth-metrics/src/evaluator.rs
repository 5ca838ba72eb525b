//! Script evaluation.
//!
//! A metric script is either a full function (`function(t) { ... }`) or a
//! bare expression in `t`, the number of milliseconds since the engine
//! started. Scalar kinds must produce a number or a boolean; histograms and
//! summaries produce an object keyed by bucket bound or quantile.

use std::cell::RefCell;

use rquickjs::{CatchResultExt, CaughtError, Context, Function, Runtime, Value};

use crate::error::{MetricError, Result};
use crate::metric::{Metric, MetricValue};

/// Computes a metric's value for a point in time.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, metric: &Metric, elapsed_ms: u64) -> Result<MetricValue>;
}

// QuickJS runtimes are not `Send`, so each thread keeps its own.
thread_local! {
    static THREAD_RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Evaluates metric scripts with QuickJS.
///
/// Every evaluation gets a fresh context on the calling thread's cached
/// runtime, so scripts cannot leak globals into each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsEvaluator;

impl JsEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn with_runtime<T>(f: impl FnOnce(&Runtime) -> Result<T>) -> Result<T> {
        THREAD_RUNTIME.with(|cell| {
            let mut slot = cell.borrow_mut();
            let runtime = match &mut *slot {
                Some(runtime) => runtime,
                empty => empty.insert(
                    Runtime::new().map_err(|e| MetricError::Runtime(e.to_string()))?,
                ),
            };
            f(runtime)
        })
    }
}

impl ScriptEvaluator for JsEvaluator {
    fn evaluate(&self, metric: &Metric, elapsed_ms: u64) -> Result<MetricValue> {
        let source = function_source(metric.script());

        Self::with_runtime(|runtime| {
            let context =
                Context::full(runtime).map_err(|e| MetricError::Runtime(e.to_string()))?;
            context.with(|ctx| {
                let function: Function = ctx
                    .eval(source.as_str())
                    .catch(&ctx)
                    .map_err(|caught| convert_caught_error(metric, caught))?;
                let value: Value = function
                    .call((elapsed_ms as f64,))
                    .catch(&ctx)
                    .map_err(|caught| convert_caught_error(metric, caught))?;
                convert_value(metric, &value)
            })
        })
    }
}

/// Source text that evaluates to the metric's function.
fn function_source(script: &str) -> String {
    let script = script.trim();
    if script.starts_with("function") {
        format!("({script})")
    } else {
        // Newline so a trailing `//` comment cannot swallow the brace.
        format!("(function(t) {{ return {script}\n}})")
    }
}

fn convert_value(metric: &Metric, value: &Value<'_>) -> Result<MetricValue> {
    if metric.kind().is_distribution() {
        let Some(object) = value.as_object() else {
            return Err(unexpected(metric, value));
        };

        let mut samples = Vec::new();
        for prop in object.props::<String, Value>() {
            let (key, sample) = prop.map_err(|e| MetricError::script(metric.name(), e.to_string()))?;
            let Some(number) = sample.as_number() else {
                return Err(unexpected(metric, &sample));
            };
            samples.push((key, number));
        }
        samples.sort_by(|a, b| sort_key(&a.0).total_cmp(&sort_key(&b.0)));
        return Ok(MetricValue::Distribution(samples));
    }

    if let Some(number) = value.as_number() {
        return Ok(MetricValue::Scalar(number));
    }
    if let Some(flag) = value.as_bool() {
        return Ok(MetricValue::Scalar(if flag { 1.0 } else { 0.0 }));
    }
    Err(unexpected(metric, value))
}

/// Buckets and quantiles are ordered numerically; unparsable keys go last.
fn sort_key(key: &str) -> f64 {
    key.trim().parse::<f64>().unwrap_or(f64::INFINITY)
}

fn unexpected(metric: &Metric, value: &Value<'_>) -> MetricError {
    MetricError::UnexpectedValue {
        metric: metric.name().to_string(),
        kind: metric.kind(),
        found: format!("{:?}", value.type_of()),
    }
}

fn convert_caught_error(metric: &Metric, caught: CaughtError<'_>) -> MetricError {
    let message = match caught {
        CaughtError::Exception(exc) => exc
            .message()
            .unwrap_or_else(|| "uncaught exception".to_string()),
        CaughtError::Value(val) => format!("script threw a {:?}", val.type_of()),
        CaughtError::Error(err) => err.to_string(),
    };
    MetricError::script(metric.name(), message)
}
