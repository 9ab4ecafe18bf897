use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use quanta::Instant;

use promstat_util::{Quantile, Summary as Sketch};

use crate::builder::RegistryConfig;
use crate::common::TimeUnit;
use crate::family::Family;
use crate::formatting::{write_metric_line, Value};
use crate::label::LabelSet;

struct SummaryState {
    sketch: Sketch,
    count: u64,
    sum: f64,
}

/// A single summary time series.
pub(crate) struct SummaryCell {
    state: Mutex<SummaryState>,
}

impl SummaryCell {
    fn new(params: &SketchParams) -> Self {
        let sketch = Sketch::new(params.error, params.max_bins, params.min_value);
        SummaryCell { state: Mutex::new(SummaryState { sketch, count: 0, sum: 0.0 }) }
    }

    fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        state.sketch.add(value);
        state.count += 1;
        state.sum += value;
    }

    fn snapshot(&self, quantiles: &[Quantile]) -> (Vec<(f64, f64)>, u64, f64) {
        let state = self.state.lock();
        let estimates = quantiles
            .iter()
            .map(|q| (q.value(), state.sketch.quantile(q.value()).unwrap_or(0.0)))
            .collect();
        (estimates, state.count, state.sum)
    }
}

#[derive(Clone, Copy)]
struct SketchParams {
    error: f64,
    max_bins: u32,
    min_value: f64,
}

/// A Prometheus summary, along with all of its labeled instances.
///
/// Quantiles are estimated with a bounded-memory sketch, so the configured targets are approximate
/// within the registry's configured relative error.  Count and sum are exact.  Like
/// [`Histogram`](crate::Histogram), the unlabeled root instance aggregates every observation.
pub struct Summary {
    family: Family<SummaryCell>,
    quantiles: Vec<Quantile>,
    params: SketchParams,
    unit: AtomicU8,
}

impl Summary {
    pub(crate) fn new(name: &str, quantiles: Vec<Quantile>, config: &RegistryConfig) -> Self {
        let params = SketchParams {
            error: config.summary_error,
            max_bins: config.summary_max_bins,
            min_value: config.summary_min_value,
        };

        Summary {
            family: Family::new(name, SummaryCell::new(&params)),
            quantiles,
            params,
            unit: AtomicU8::new(config.default_time_unit.to_u8()),
        }
    }

    /// Gets the name of this summary.
    pub fn name(&self) -> &str {
        self.family.name()
    }

    /// Gets the quantile targets of this summary.
    pub fn quantiles(&self) -> &[Quantile] {
        &self.quantiles
    }

    /// Gets the unit durations are converted to before being observed.
    pub fn preferred_unit(&self) -> TimeUnit {
        TimeUnit::from_u8(self.unit.load(Ordering::Relaxed))
    }

    /// Reads the quantile estimates, count, and sum of the instance identified by `labels`.
    ///
    /// `None`, or an empty set, reads the aggregate root instance.  Returns `None` if no instance
    /// exists for `labels`.
    pub fn read(&self, labels: Option<&LabelSet>) -> Option<(Vec<(f64, f64)>, u64, f64)> {
        match labels {
            Some(labels) => self.family.get(labels).map(|cell| cell.snapshot(&self.quantiles)),
            None => Some(self.family.root().snapshot(&self.quantiles)),
        }
    }

    /// Renders every instance of this summary.
    pub fn render(&self, buffer: &mut String) {
        let name = self.family.name();

        self.render_cell(buffer, name, &LabelSet::empty(), &self.family.root());
        for (labels, cell) in self.family.children() {
            self.render_cell(buffer, name, &labels, &cell);
        }
    }

    fn render_cell(&self, buffer: &mut String, name: &str, labels: &LabelSet, cell: &SummaryCell) {
        let (estimates, count, sum) = cell.snapshot(&self.quantiles);

        for (quantile, estimate) in estimates {
            write_metric_line(
                buffer,
                name,
                None,
                labels,
                Some(("quantile", Value(quantile))),
                Value(estimate),
            );
        }
        write_metric_line::<&str, _>(buffer, name, Some("count"), labels, None, count);
        write_metric_line::<&str, _>(buffer, name, Some("sum"), labels, None, Value(sum));
    }

    pub(crate) fn family(&self) -> &Family<SummaryCell> {
        &self.family
    }
}

/// Handle to one instance of a [`Summary`].
#[derive(Clone)]
pub struct SummaryHandle {
    summary: Arc<Summary>,
    labels: LabelSet,
    cell: Arc<SummaryCell>,
}

impl SummaryHandle {
    pub(crate) fn new(summary: Arc<Summary>, labels: LabelSet) -> Self {
        let params = summary.params;
        let cell = summary.family.get_or_create(&labels, || SummaryCell::new(&params));

        SummaryHandle { summary, labels, cell }
    }

    /// Observes `value`.
    ///
    /// Observations through a labeled handle are also counted by the aggregate root instance.
    pub fn observe(&self, value: f64) {
        self.cell.observe(value);
        if !self.labels.is_empty() {
            self.summary.family.root().observe(value);
        }
    }

    /// Observes `duration`, converted to the summary's preferred unit.
    pub fn record_duration(&self, duration: Duration) {
        self.observe(self.summary.preferred_unit().convert(duration));
    }

    /// Starts a timer that records the elapsed time when it is stopped or dropped.
    pub fn start_timer(&self) -> SummaryTimer {
        SummaryTimer { handle: self.clone(), start: Instant::now(), observed: false }
    }

    /// Sets the unit durations are converted to.
    ///
    /// The unit is shared by every handle to the summary.
    pub fn set_preferred_unit(&self, unit: TimeUnit) {
        self.summary.unit.store(unit.to_u8(), Ordering::Relaxed);
    }

    /// Gets the unit durations are converted to.
    pub fn preferred_unit(&self) -> TimeUnit {
        self.summary.preferred_unit()
    }

    /// Gets the name of the summary.
    pub fn name(&self) -> &str {
        self.summary.name()
    }

    /// Gets the labels this handle is bound to.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub(crate) fn summary(&self) -> &Arc<Summary> {
        &self.summary
    }

    /// Detaches the instance this handle is bound to from the summary.
    pub(crate) fn detach(&self) -> bool {
        let family = &self.summary.family;
        if self.labels.is_empty() {
            family.replace_root(&self.cell, SummaryCell::new(&self.summary.params))
        } else {
            family.remove(&self.labels, &self.cell)
        }
    }
}

impl fmt::Debug for SummaryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryHandle")
            .field("name", &self.name())
            .field("labels", &self.labels)
            .field("unit", &self.preferred_unit())
            .finish()
    }
}

/// Timer that records its elapsed time into a summary, in the summary's preferred unit.
#[must_use = "a timer records as soon as it is dropped"]
pub struct SummaryTimer {
    handle: SummaryHandle,
    start: Instant,
    observed: bool,
}

impl SummaryTimer {
    /// Records the elapsed time and returns it.
    pub fn observe_duration(mut self) -> Duration {
        self.observe()
    }

    /// Stops the timer without recording anything.
    pub fn stop_and_discard(mut self) {
        self.observed = true;
    }

    fn observe(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        self.observed = true;
        self.handle.record_duration(elapsed);
        elapsed
    }
}

impl Drop for SummaryTimer {
    fn drop(&mut self) {
        if !self.observed {
            self.observe();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use approx::assert_relative_eq;
    use promstat_util::parse_quantiles;

    use super::{Summary, SummaryHandle};
    use crate::{builder::RegistryConfig, LabelSet, TimeUnit};

    fn summary(name: &str, quantiles: &[f64]) -> Arc<Summary> {
        Arc::new(Summary::new(name, parse_quantiles(quantiles), &RegistryConfig::default()))
    }

    #[test]
    fn test_empty_summary_renders_zeroes() {
        let summary = summary("rpc_seconds", &[0.5, 0.99]);

        let mut rendered = String::new();
        summary.render(&mut rendered);

        let expected = concat!(
            "rpc_seconds{quantile=\"0.5\"} 0\n",
            "rpc_seconds{quantile=\"0.99\"} 0\n",
            "rpc_seconds_count 0\n",
            "rpc_seconds_sum 0\n",
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_quantiles_count_and_sum() {
        let summary = summary("payload_bytes", &[0.0, 0.5, 1.0]);
        let labels = LabelSet::new([("kind", "upload")]).unwrap();
        let handle = SummaryHandle::new(Arc::clone(&summary), labels.clone());

        for value in 1..=100 {
            handle.observe(value as f64);
        }

        let (estimates, count, sum) = summary.read(Some(&labels)).expect("child exists");
        assert_eq!(count, 100);
        assert_eq!(sum, 5050.0);
        assert_relative_eq!(estimates[0].1, 1.0, max_relative = 0.001);
        assert_relative_eq!(estimates[1].1, 50.0, max_relative = 0.03);
        assert_relative_eq!(estimates[2].1, 100.0, max_relative = 0.001);

        let (_, root_count, root_sum) = summary.read(None).expect("root always exists");
        assert_eq!(root_count, 100);
        assert_eq!(root_sum, 5050.0);
    }

    #[test]
    fn test_non_finite_values_skip_the_sketch() {
        let summary = summary("ratio", &[1.0]);
        let handle = SummaryHandle::new(Arc::clone(&summary), LabelSet::empty());

        handle.observe(2.0);
        handle.observe(f64::INFINITY);

        let (estimates, count, sum) = summary.read(None).expect("root always exists");
        assert_eq!(count, 2);
        assert_eq!(sum, f64::INFINITY);
        assert_relative_eq!(estimates[0].1, 2.0, max_relative = 0.001);
    }

    #[test]
    fn test_record_duration_uses_preferred_unit() {
        let summary = summary("gc_pause", &[0.5]);
        let handle = SummaryHandle::new(Arc::clone(&summary), LabelSet::empty());
        assert_eq!(handle.preferred_unit(), TimeUnit::Seconds);

        handle.record_duration(Duration::from_millis(250));
        handle.set_preferred_unit(TimeUnit::Milliseconds);
        handle.record_duration(Duration::from_millis(250));

        let (_, count, sum) = summary.read(None).expect("root always exists");
        assert_eq!(count, 2);
        assert_eq!(sum, 250.25);
        assert_eq!(summary.preferred_unit(), TimeUnit::Milliseconds);
    }

    #[test]
    fn test_timer_records_once() {
        let summary = summary("task", &[0.5]);
        let handle = SummaryHandle::new(Arc::clone(&summary), LabelSet::empty());

        let elapsed = handle.start_timer().observe_duration();
        assert!(elapsed < Duration::from_secs(60));
        handle.start_timer().stop_and_discard();

        let (_, count, _) = summary.read(None).expect("root always exists");
        assert_eq!(count, 1);
    }
}
