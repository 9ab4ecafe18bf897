use std::{slice, sync::Arc, time::Duration};

use promstat_util::MetricKind;
use thiserror::Error as ThisError;

use crate::counter::Counter;
use crate::gauge::Gauge;
use crate::histogram::Histogram;
use crate::summary::Summary;

/// Errors that could occur while registering a metric.
///
/// Every variant describes a configuration conflict: a metric name being reused in a way that is
/// inconsistent with how it was first registered, or an invalid configuration.  These are
/// programming errors, and no handle is ever handed out when one occurs.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum RegistryError {
    /// The name is already registered as a different kind of metric.
    #[error("metric `{name}` is already registered as a {existing}, not a {requested}")]
    KindMismatch {
        /// Metric name.
        name: String,
        /// Kind the name is registered as.
        existing: MetricKind,
        /// Kind that was requested.
        requested: MetricKind,
    },

    /// The labels do not match the label names the metric was registered with.
    #[error("metric `{name}` is registered with labels {existing:?}, got {requested:?}")]
    LabelSchemaMismatch {
        /// Metric name.
        name: String,
        /// Label names the metric is registered with.
        existing: Vec<String>,
        /// Label names that were requested.
        requested: Vec<String>,
    },

    /// The histogram is already registered with different bucket bounds.
    #[error("histogram `{name}` is registered with buckets {existing:?}, got {requested:?}")]
    BucketsMismatch {
        /// Metric name.
        name: String,
        /// Bucket bounds the histogram is registered with.
        existing: Vec<f64>,
        /// Bucket bounds that were requested.
        requested: Vec<f64>,
    },

    /// The summary is already registered with different quantiles.
    #[error("summary `{name}` is registered with quantiles {existing:?}, got {requested:?}")]
    QuantilesMismatch {
        /// Metric name.
        name: String,
        /// Quantiles the summary is registered with.
        existing: Vec<f64>,
        /// Quantiles that were requested.
        requested: Vec<f64>,
    },

    /// The bucket bounds are not strictly ascending, or contain `NaN`.
    #[error("histogram `{name}` has invalid buckets {buckets:?}")]
    InvalidBuckets {
        /// Metric name.
        name: String,
        /// The offending bucket bounds.
        buckets: Vec<f64>,
    },
}

/// Errors that could occur while building a [`LabelSet`](crate::LabelSet).
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum LabelSetError {
    /// The same label name was given more than once.
    #[error("label `{0}` appears more than once")]
    DuplicateName(String),
}

/// A registered metric, tagged with its kind.
#[derive(Clone)]
pub enum MetricEntry {
    /// A counter.
    Counter(Arc<Counter>),
    /// A gauge.
    Gauge(Arc<Gauge>),
    /// A histogram.
    Histogram(Arc<Histogram>),
    /// A summary.
    Summary(Arc<Summary>),
}

impl MetricEntry {
    /// Gets the kind of this metric.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricEntry::Counter(_) => MetricKind::Counter,
            MetricEntry::Gauge(_) => MetricKind::Gauge,
            MetricEntry::Histogram(_) => MetricKind::Histogram,
            MetricEntry::Summary(_) => MetricKind::Summary,
        }
    }

    /// Gets the name of this metric.
    pub fn name(&self) -> &str {
        match self {
            MetricEntry::Counter(counter) => counter.name(),
            MetricEntry::Gauge(gauge) => gauge.name(),
            MetricEntry::Histogram(histogram) => histogram.name(),
            MetricEntry::Summary(summary) => summary.name(),
        }
    }

    /// Renders every instance of this metric, without the `# HELP` and `# TYPE` lines.
    pub fn render(&self, buffer: &mut String) {
        match self {
            MetricEntry::Counter(counter) => counter.render(buffer),
            MetricEntry::Gauge(gauge) => gauge.render(buffer),
            MetricEntry::Histogram(histogram) => histogram.render(buffer),
            MetricEntry::Summary(summary) => summary.render(buffer),
        }
    }

    /// Whether or not every instance of this metric has been unregistered.
    pub(crate) fn is_vacant(&self) -> bool {
        match self {
            MetricEntry::Counter(counter) => counter.family().is_vacant(),
            MetricEntry::Gauge(gauge) => gauge.family().is_vacant(),
            MetricEntry::Histogram(histogram) => histogram.family().is_vacant(),
            MetricEntry::Summary(summary) => summary.family().is_vacant(),
        }
    }

    /// Whether or not both entries point at the very same metric.
    pub(crate) fn ptr_eq(&self, other: &MetricEntry) -> bool {
        match (self, other) {
            (MetricEntry::Counter(a), MetricEntry::Counter(b)) => Arc::ptr_eq(a, b),
            (MetricEntry::Gauge(a), MetricEntry::Gauge(b)) => Arc::ptr_eq(a, b),
            (MetricEntry::Histogram(a), MetricEntry::Histogram(b)) => Arc::ptr_eq(a, b),
            (MetricEntry::Summary(a), MetricEntry::Summary(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A metric captured by a [`Snapshot`], along with its description.
#[derive(Clone)]
pub struct SnapshotEntry {
    pub(crate) help: Option<String>,
    pub(crate) metric: MetricEntry,
}

impl SnapshotEntry {
    /// Gets the name of the metric.
    pub fn name(&self) -> &str {
        self.metric.name()
    }

    /// Gets the description of the metric, if one was set.
    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Gets the kind of the metric.
    pub fn kind(&self) -> MetricKind {
        self.metric.kind()
    }

    /// Gets the metric itself.
    pub fn metric(&self) -> &MetricEntry {
        &self.metric
    }
}

/// Point-in-time list of the metrics held by a [`Registry`](crate::Registry).
///
/// Only the set of metrics is frozen: their values are read when they are rendered.
#[derive(Clone, Default)]
pub struct Snapshot {
    pub(crate) entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Iterates over the metrics, in export order.
    pub fn iter(&self) -> slice::Iter<'_, SnapshotEntry> {
        self.entries.iter()
    }

    /// Number of metrics in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether or not this snapshot holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Unit that durations are converted to when recorded into a summary.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    #[default]
    Seconds,
}

impl TimeUnit {
    /// Converts `duration` to a floating-point value in this unit.
    pub fn convert(&self, duration: Duration) -> f64 {
        let nanos = duration.as_nanos() as f64;
        match self {
            TimeUnit::Nanoseconds => nanos,
            TimeUnit::Microseconds => nanos / 1_000.0,
            TimeUnit::Milliseconds => nanos / 1_000_000.0,
            TimeUnit::Seconds => duration.as_secs_f64(),
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            TimeUnit::Nanoseconds => 0,
            TimeUnit::Microseconds => 1,
            TimeUnit::Milliseconds => 2,
            TimeUnit::Seconds => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> TimeUnit {
        match value {
            0 => TimeUnit::Nanoseconds,
            1 => TimeUnit::Microseconds,
            2 => TimeUnit::Milliseconds,
            _ => TimeUnit::Seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TimeUnit;

    #[test]
    fn test_time_unit_conversion() {
        let duration = Duration::from_millis(1500);
        assert_eq!(TimeUnit::Nanoseconds.convert(duration), 1_500_000_000.0);
        assert_eq!(TimeUnit::Microseconds.convert(duration), 1_500_000.0);
        assert_eq!(TimeUnit::Milliseconds.convert(duration), 1_500.0);
        assert_eq!(TimeUnit::Seconds.convert(duration), 1.5);
    }
}
