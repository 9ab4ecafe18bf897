use std::fmt;

/// Metric kind.
///
/// Defines the kind, or type, of a metric.  Follows the metric types of the Prometheus data model:
/// - counters
/// - gauges
/// - histograms
/// - summaries
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Histogram type.
    Histogram,
    /// Summary type.
    Summary,
}

impl MetricKind {
    /// Gets the name of this kind as used on `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::MetricKind;

    #[test]
    fn test_kind_names() {
        assert_eq!(MetricKind::Counter.as_str(), "counter");
        assert_eq!(MetricKind::Gauge.as_str(), "gauge");
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
        assert_eq!(MetricKind::Summary.to_string(), "summary");
    }
}
