//! Prometheus text exposition format.

use std::collections::BTreeMap;

use crate::metric::{Metric, MetricKind, MetricValue};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Append the HELP/TYPE header and samples of one metric to `output`.
pub fn write_metric(output: &mut String, metric: &Metric, value: &MetricValue) {
    let name = metric.name();
    if let Some(description) = metric.description() {
        output.push_str(&format!("# HELP {} {}\n", name, escape_help(description)));
    }
    output.push_str(&format!("# TYPE {} {}\n", name, metric.kind()));

    match value {
        MetricValue::Scalar(v) => write_sample(output, name, metric.labels(), None, *v),
        MetricValue::Distribution(samples) => {
            let (sample_name, extra_label) = match metric.kind() {
                MetricKind::Histogram => (format!("{name}_bucket"), "le"),
                _ => (name.to_string(), "quantile"),
            };
            for (key, v) in samples {
                write_sample(
                    output,
                    &sample_name,
                    metric.labels(),
                    Some((extra_label, key.as_str())),
                    *v,
                );
            }
        }
    }
}

fn write_sample(
    output: &mut String,
    name: &str,
    labels: &BTreeMap<String, String>,
    extra: Option<(&str, &str)>,
    value: f64,
) {
    output.push_str(name);

    let mut pairs = labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(extra)
        .peekable();
    if pairs.peek().is_some() {
        let rendered: Vec<String> = pairs
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();
        output.push('{');
        output.push_str(&rendered.join(","));
        output.push('}');
    }

    output.push(' ');
    output.push_str(&format_value(value));
    output.push('\n');
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('\n', r"\n")
}

fn escape_help(text: &str) -> String {
    text.replace('\\', r"\\").replace('\n', r"\n")
}
