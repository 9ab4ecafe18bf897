use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::family::Family;
use crate::formatting::{write_metric_line, Value};
use crate::label::LabelSet;

#[derive(Debug, Default)]
struct CounterState {
    integer: u64,
    float: f64,
    used: bool,
}

impl CounterState {
    fn value(&self) -> f64 {
        self.integer as f64 + self.float
    }

    fn render(&self, buffer: &mut String, name: &str, labels: &LabelSet) {
        // Integer-only counters are written exactly, even past 2^53.
        if self.float == 0.0 {
            write_metric_line::<&str, _>(buffer, name, None, labels, None, self.integer);
        } else {
            write_metric_line::<&str, _>(buffer, name, None, labels, None, Value(self.value()));
        }
    }
}

/// A single counter time series.
#[derive(Debug, Default)]
pub(crate) struct CounterCell {
    state: Mutex<CounterState>,
}

impl CounterCell {
    fn increment(&self, delta: f64) {
        let mut state = self.state.lock();
        state.float += delta;
        state.used = true;
    }

    fn increment_by(&self, delta: u64) {
        let mut state = self.state.lock();
        state.integer = state.integer.saturating_add(delta);
        state.used = true;
    }

    fn read(&self) -> f64 {
        self.state.lock().value()
    }

    fn read_integer(&self) -> u64 {
        self.state.lock().integer
    }
}

/// A Prometheus counter, along with all of its labeled instances.
///
/// Counters only ever go up.  Negative deltas are not rejected, though, and callers that may
/// produce them are responsible for filtering them out.
///
/// Each instance keeps an exact integer total and a floating-point total side by side, and reports
/// their sum.
///
/// The unlabeled instance is only rendered once it has been incremented at least once, while
/// labeled instances are rendered as soon as they exist.
pub struct Counter {
    family: Family<CounterCell>,
}

impl Counter {
    pub(crate) fn new(name: &str) -> Self {
        Counter { family: Family::new(name, CounterCell::default()) }
    }

    /// Gets the name of this counter.
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

    /// Reads the integer total of the instance identified by `labels`.
    ///
    /// Only increments made with [`CounterHandle::increment_by`] count towards it.
    pub fn read_integer(&self, labels: Option<&LabelSet>) -> u64 {
        match labels {
            Some(labels) => self.family.get(labels).map_or(0, |cell| cell.read_integer()),
            None => self.family.root().read_integer(),
        }
    }

    /// Renders every instance of this counter.
    pub fn render(&self, buffer: &mut String) {
        let name = self.family.name();

        let root = self.family.root();
        let state = root.state.lock();
        if state.used {
            state.render(buffer, name, &LabelSet::empty());
        }
        drop(state);

        for (labels, cell) in self.family.children() {
            cell.state.lock().render(buffer, name, &labels);
        }
    }

    pub(crate) fn family(&self) -> &Family<CounterCell> {
        &self.family
    }
}

/// Handle to one instance of a [`Counter`].
#[derive(Clone)]
pub struct CounterHandle {
    counter: Arc<Counter>,
    labels: LabelSet,
    cell: Arc<CounterCell>,
}

impl CounterHandle {
    pub(crate) fn new(counter: Arc<Counter>, labels: LabelSet) -> Self {
        let cell = counter.family.get_or_create(&labels, CounterCell::default);
        CounterHandle { counter, labels, cell }
    }

    /// Increments the counter by `delta`.
    pub fn increment(&self, delta: f64) {
        self.cell.increment(delta);
    }

    /// Increments the counter by the integer `delta`.
    ///
    /// Integer increments are tracked exactly, and saturate at `u64::MAX`.
    pub fn increment_by(&self, delta: u64) {
        self.cell.increment_by(delta);
    }

    /// Reads the current value of the counter.
    pub fn read(&self) -> f64 {
        self.cell.read()
    }

    /// Reads the integer total of the counter.
    pub fn read_integer(&self) -> u64 {
        self.cell.read_integer()
    }

    /// Gets the name of the counter.
    pub fn name(&self) -> &str {
        self.counter.name()
    }

    /// Gets the labels this handle is bound to.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub(crate) fn counter(&self) -> &Arc<Counter> {
        &self.counter
    }

    /// Detaches the instance this handle is bound to from the counter.
    pub(crate) fn detach(&self) -> bool {
        let family = &self.counter.family;
        if self.labels.is_empty() {
            family.replace_root(&self.cell, CounterCell::default())
        } else {
            family.remove(&self.labels, &self.cell)
        }
    }
}

impl fmt::Debug for CounterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterHandle")
            .field("name", &self.name())
            .field("labels", &self.labels)
            .field("value", &self.read())
            .finish()
    }
}
