//! Metric definitions from environment variables.
//!
//! A metric named `cpu_load` is configured with:
//!
//! - `METRIC_CPU_LOAD_EXPR`: script (required)
//! - `METRIC_CPU_LOAD_TYPE`: `counter`, `gauge`, `histogram`, `summary` or `untyped`
//! - `METRIC_CPU_LOAD_DESCR`: HELP text
//! - `METRIC_CPU_LOAD_LABEL`: `key=value`, comma separated for several labels

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::engine::MetricsEngine;
use crate::evaluator::{JsEvaluator, ScriptEvaluator};
use crate::metric::{MetricBuilder, MetricKind};

pub const METRIC_ENV_PREFIX: &str = "METRIC_";

/// Collects metric definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngineBuilder {
    builders: BTreeMap<String, MetricBuilder>,
}

impl MetricsEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read definitions from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = Self::new();
        for (key, value) in vars {
            builder.add_var(key.as_ref(), value.as_ref());
        }
        builder
    }

    /// Apply one `METRIC_<NAME>_<FIELD>` variable. Other variables are ignored.
    pub fn add_var(&mut self, key: &str, value: &str) -> &mut Self {
        let Some((name, field)) = key
            .strip_prefix(METRIC_ENV_PREFIX)
            .and_then(|rest| rest.rsplit_once('_'))
        else {
            return self;
        };
        if name.is_empty() || !matches!(field, "EXPR" | "TYPE" | "DESCR" | "LABEL") {
            return self;
        }

        let name = name.to_ascii_lowercase();
        let entry = self
            .builders
            .entry(name.clone())
            .or_insert_with(|| MetricBuilder::new(name.as_str()));
        let current = std::mem::take(entry);

        *entry = match field {
            "EXPR" => current.with_script(value),
            "TYPE" => current.with_kind(MetricKind::parse(value)),
            "DESCR" => current.with_description(value),
            _ => parse_labels(&name, value)
                .into_iter()
                .fold(current, |b, (k, v)| b.with_label(k, v)),
        };
        self
    }

    /// Add or replace a metric. Names are lowercased like those read from
    /// `METRIC_<NAME>_*`, so `CPU` replaces `cpu`.
    pub fn with_metric(mut self, builder: MetricBuilder) -> Self {
        let builder = builder.lowercase_name();
        self.builders.insert(builder.name().to_string(), builder);
        self
    }

    /// Number of metrics seen so far, complete or not.
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Build an engine evaluating scripts with QuickJS.
    pub fn build(self) -> MetricsEngine {
        self.build_with(JsEvaluator::new())
    }

    /// Build an engine; metrics without a script are skipped.
    pub fn build_with(self, evaluator: impl ScriptEvaluator + 'static) -> MetricsEngine {
        let mut metrics = Vec::with_capacity(self.builders.len());
        for (name, builder) in self.builders {
            match builder.build() {
                Some(metric) => {
                    debug!(metric = %name, kind = %metric.kind(), "Configured metric");
                    metrics.push(metric);
                }
                None => warn!(metric = %name, "Skipping metric without an expression"),
            }
        }
        MetricsEngine::new(metrics, evaluator)
    }
}

fn parse_labels(metric: &str, value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Some((k.trim().to_string(), v.trim().to_string())),
            _ => {
                warn!(metric, label = pair, "Ignoring label without a name=value pair");
                None
            }
        })
        .collect()
}
