use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;

use crate::family::Family;
use crate::formatting::{write_metric_line, Value};
use crate::label::LabelSet;

#[derive(Debug, Default)]
struct GaugeState {
    value: f64,
    used: bool,
}

/// A single gauge time series.
#[derive(Debug, Default)]
pub(crate) struct GaugeCell {
    state: Mutex<GaugeState>,
}

impl GaugeCell {
    fn update<F>(&self, f: F)
    where
        F: FnOnce(f64) -> f64,
    {
        let mut state = self.state.lock();
        state.value = f(state.value);
        state.used = true;
    }

    fn read(&self) -> f64 {
        self.state.lock().value
    }

    fn snapshot(&self) -> (f64, bool) {
        let state = self.state.lock();
        (state.value, state.used)
    }
}

/// A Prometheus gauge, along with all of its labeled instances.
///
/// The unlabeled instance is only rendered once it has been updated at least once, while labeled
/// instances are rendered as soon as they exist.
pub struct Gauge {
    family: Family<GaugeCell>,
}

impl Gauge {
    pub(crate) fn new(name: &str) -> Self {
        Gauge { family: Family::new(name, GaugeCell::default()) }
    }

    /// Gets the name of this gauge.
    pub fn name(&self) -> &str {
        self.family.name()
    }

    /// Reads the current value of the instance identified by `labels`.
    ///
    /// `None`, or an empty set, reads the unlabeled instance.  Instances that do not exist read as
    /// zero.
    pub fn read(&self, labels: Option<&LabelSet>) -> f64 {
        match labels {
            Some(labels) => self.family.get(labels).map_or(0.0, |cell| cell.read()),
            None => self.family.root().read(),
        }
    }

    /// Renders every instance of this gauge.
    pub fn render(&self, buffer: &mut String) {
        let name = self.family.name();

        let (value, used) = self.family.root().snapshot();
        if used {
            write_metric_line::<&str, _>(buffer, name, None, &LabelSet::empty(), None, Value(value));
        }

        for (labels, cell) in self.family.children() {
            let (value, _) = cell.snapshot();
            write_metric_line::<&str, _>(buffer, name, None, &labels, None, Value(value));
        }
    }

    pub(crate) fn family(&self) -> &Family<GaugeCell> {
        &self.family
    }
}

/// Handle to one instance of a [`Gauge`].
#[derive(Clone)]
pub struct GaugeHandle {
    gauge: Arc<Gauge>,
    labels: LabelSet,
    cell: Arc<GaugeCell>,
}

impl GaugeHandle {
    pub(crate) fn new(gauge: Arc<Gauge>, labels: LabelSet) -> Self {
        let cell = gauge.family.get_or_create(&labels, GaugeCell::default);
        GaugeHandle { gauge, labels, cell }
    }

    /// Sets the gauge to `value`.
    pub fn set(&self, value: f64) {
        self.cell.update(|_| value);
    }

    /// Increments the gauge by `delta`.
    pub fn increment(&self, delta: f64) {
        self.cell.update(|current| current + delta);
    }

    /// Decrements the gauge by `delta`.
    pub fn decrement(&self, delta: f64) {
        self.cell.update(|current| current - delta);
    }

    /// Sets the gauge to the current UNIX time, in seconds.
    pub fn set_to_current_time(&self) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_secs_f64());
        self.set(now);
    }

    /// Reads the current value of the gauge.
    pub fn read(&self) -> f64 {
        self.cell.read()
    }

    /// Gets the name of the gauge.
    pub fn name(&self) -> &str {
        self.gauge.name()
    }

    /// Gets the labels this handle is bound to.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub(crate) fn gauge(&self) -> &Arc<Gauge> {
        &self.gauge
    }

    /// Detaches the instance this handle is bound to from the gauge.
    pub(crate) fn detach(&self) -> bool {
        let family = &self.gauge.family;
        if self.labels.is_empty() {
            family.replace_root(&self.cell, GaugeCell::default())
        } else {
            family.remove(&self.labels, &self.cell)
        }
    }
}

impl fmt::Debug for GaugeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugeHandle")
            .field("name", &self.name())
            .field("labels", &self.labels)
            .field("value", &self.read())
            .finish()
    }
}
