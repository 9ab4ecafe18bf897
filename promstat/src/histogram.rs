use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use quanta::Instant;

use promstat_util::Histogram as Buckets;

use crate::family::Family;
use crate::formatting::{write_metric_line, Value};
use crate::label::LabelSet;

/// A single histogram time series.
pub(crate) struct HistogramCell {
    buckets: Mutex<Buckets>,
}

impl HistogramCell {
    fn new(template: &Buckets) -> Self {
        HistogramCell { buckets: Mutex::new(template.empty_like()) }
    }

    fn observe(&self, value: f64) {
        self.buckets.lock().record(value);
    }

    fn snapshot(&self) -> (Vec<(f64, u64)>, u64, f64) {
        let buckets = self.buckets.lock();
        (buckets.buckets(), buckets.count(), buckets.sum())
    }
}

/// A Prometheus histogram, along with all of its labeled instances.
///
/// Every observation is counted by the unlabeled root instance, and observations made through a
/// labeled handle are additionally counted by that handle's instance.  The root therefore always
/// holds the aggregate over all label combinations, and is always rendered.
pub struct Histogram {
    family: Family<HistogramCell>,
    template: Buckets,
}

impl Histogram {
    pub(crate) fn new(name: &str, template: Buckets) -> Self {
        let root = HistogramCell::new(&template);
        Histogram { family: Family::new(name, root), template }
    }

    /// Gets the name of this histogram.
    pub fn name(&self) -> &str {
        self.family.name()
    }

    /// Gets the upper bounds of the buckets, including the trailing `+Inf`.
    pub fn bounds(&self) -> &[f64] {
        self.template.bounds()
    }

    /// Reads the cumulative buckets, count, and sum of the instance identified by `labels`.
    ///
    /// `None`, or an empty set, reads the aggregate root instance.  Returns `None` if no instance
    /// exists for `labels`.
    pub fn read(&self, labels: Option<&LabelSet>) -> Option<(Vec<(f64, u64)>, u64, f64)> {
        match labels {
            Some(labels) => self.family.get(labels).map(|cell| cell.snapshot()),
            None => Some(self.family.root().snapshot()),
        }
    }

    /// Renders every instance of this histogram.
    ///
    /// For each instance, the cumulative `_bucket` lines are written in ascending order of their
    /// bound, followed by `_count` and `_sum`.
    pub fn render(&self, buffer: &mut String) {
        let name = self.family.name();

        render_cell(buffer, name, &LabelSet::empty(), &self.family.root());
        for (labels, cell) in self.family.children() {
            render_cell(buffer, name, &labels, &cell);
        }
    }

    pub(crate) fn family(&self) -> &Family<HistogramCell> {
        &self.family
    }
}

fn render_cell(buffer: &mut String, name: &str, labels: &LabelSet, cell: &HistogramCell) {
    let (buckets, count, sum) = cell.snapshot();

    for (le, count) in buckets {
        write_metric_line(buffer, name, Some("bucket"), labels, Some(("le", Value(le))), count);
    }
    write_metric_line::<&str, _>(buffer, name, Some("count"), labels, None, count);
    write_metric_line::<&str, _>(buffer, name, Some("sum"), labels, None, Value(sum));
}

/// Handle to one instance of a [`Histogram`].
#[derive(Clone)]
pub struct HistogramHandle {
    histogram: Arc<Histogram>,
    labels: LabelSet,
    cell: Arc<HistogramCell>,
}

impl HistogramHandle {
    pub(crate) fn new(histogram: Arc<Histogram>, labels: LabelSet) -> Self {
        let template = &histogram.template;
        let cell = histogram.family.get_or_create(&labels, || HistogramCell::new(template));

        HistogramHandle { histogram, labels, cell }
    }

    /// Observes `value`.
    ///
    /// Observations through a labeled handle are also counted by the aggregate root instance.
    pub fn observe(&self, value: f64) {
        self.cell.observe(value);
        if !self.labels.is_empty() {
            self.histogram.family.root().observe(value);
        }
    }

    /// Starts a timer that observes the elapsed time, in seconds, when it is stopped or dropped.
    pub fn start_timer(&self) -> HistogramTimer {
        HistogramTimer { handle: self.clone(), start: Instant::now(), observed: false }
    }

    /// Gets the name of the histogram.
    pub fn name(&self) -> &str {
        self.histogram.name()
    }

    /// Gets the labels this handle is bound to.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub(crate) fn histogram(&self) -> &Arc<Histogram> {
        &self.histogram
    }

    /// Detaches the instance this handle is bound to from the histogram.
    pub(crate) fn detach(&self) -> bool {
        let family = &self.histogram.family;
        if self.labels.is_empty() {
            family.replace_root(&self.cell, HistogramCell::new(&self.histogram.template))
        } else {
            family.remove(&self.labels, &self.cell)
        }
    }
}

impl fmt::Debug for HistogramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramHandle")
            .field("name", &self.name())
            .field("labels", &self.labels)
            .finish()
    }
}

/// Timer that observes its elapsed time, in seconds, into a histogram.
///
/// The observation is made on [`observe_duration`](HistogramTimer::observe_duration), or when the
/// timer is dropped, unless it was discarded with
/// [`stop_and_discard`](HistogramTimer::stop_and_discard).
#[must_use = "a timer observes as soon as it is dropped"]
pub struct HistogramTimer {
    handle: HistogramHandle,
    start: Instant,
    observed: bool,
}

impl HistogramTimer {
    /// Observes the elapsed time and returns it, in seconds.
    pub fn observe_duration(mut self) -> f64 {
        self.observe()
    }

    /// Stops the timer without observing anything.
    pub fn stop_and_discard(mut self) {
        self.observed = true;
    }

    fn observe(&mut self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.observed = true;
        self.handle.observe(elapsed);
        elapsed
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        if !self.observed {
            self.observe();
        }
    }
}
