//! Metric definitions and evaluated values.

use std::collections::BTreeMap;
use std::fmt;

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricKind {
    Untyped,
    Counter,
    #[default]
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    /// Case-insensitive; anything unrecognised is a gauge.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "untyped" => Self::Untyped,
            "counter" => Self::Counter,
            "histogram" => Self::Histogram,
            "summary" => Self::Summary,
            _ => Self::Gauge,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untyped => "untyped",
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }

    /// Histograms and summaries evaluate to several samples.
    pub fn is_distribution(&self) -> bool {
        matches!(self, Self::Histogram | Self::Summary)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric whose value is computed by a script from the elapsed time.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    kind: MetricKind,
    script: String,
    labels: BTreeMap<String, String>,
    description: Option<String>,
}

impl Metric {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricBuilder {
    name: String,
    kind: MetricKind,
    script: Option<String>,
    labels: BTreeMap<String, String>,
    description: Option<String>,
}

impl MetricBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: MetricKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn lowercase_name(mut self) -> Self {
        self.name.make_ascii_lowercase();
        self
    }

    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && self.script.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Returns `None` until both a name and a script are set.
    pub fn build(self) -> Option<Metric> {
        if !self.is_complete() {
            return None;
        }
        Some(Metric {
            name: self.name,
            kind: self.kind,
            script: self.script?,
            labels: self.labels,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

/// Result of evaluating a metric script.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    /// Bucket bound or quantile, paired with its sample.
    Distribution(Vec<(String, f64)>),
}
