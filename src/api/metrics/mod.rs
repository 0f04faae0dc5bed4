pub mod gpu;

pub use gpu::{render_metrics, NvidiaSmiExporter};

/// Trait for exporting metrics in Prometheus text format
pub trait MetricExporter {
    /// Export metrics to Prometheus format string
    fn export_metrics(&self) -> String;
}

/// Helper struct to build exposition lines.
///
/// Lines look like `name{key="value",key2="value2"} 42`; without labels the
/// brace block is left out. No HELP/TYPE metadata is written.
pub struct MetricBuilder {
    metrics: String,
}

impl MetricBuilder {
    pub fn new() -> Self {
        Self {
            metrics: String::new(),
        }
    }

    /// Add a metric line with labels
    pub fn metric(&mut self, name: &str, labels: &[(&str, &str)], value: &str) -> &mut Self {
        self.metrics.push_str(name);

        if !labels.is_empty() {
            self.metrics.push('{');
            for (i, (key, value)) in labels.iter().enumerate() {
                if i > 0 {
                    self.metrics.push(',');
                }
                self.metrics.push_str(key);
                self.metrics.push_str("=\"");
                self.metrics.push_str(&escape_label_value(value));
                self.metrics.push('"');
            }
            self.metrics.push('}');
        }

        self.metrics.push(' ');
        self.metrics.push_str(value);
        self.metrics.push('\n');
        self
    }

    /// Build the final metric string
    pub fn build(self) -> String {
        self.metrics
    }
}

impl Default for MetricBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape backslash, double quote and newline as the text format requires.
fn escape_label_value(value: &str) -> String {
    if !value.contains(['\\', '"', '\n']) {
        return value.to_string();
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
