use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{map::Entry, IndexMap};
use parking_lot::{Mutex, RwLock};

use promstat_util::{parse_quantiles, Histogram as Buckets, MetricKind};

use crate::builder::{RegistryBuilder, RegistryConfig};
use crate::common::{MetricEntry, RegistryError, Snapshot, SnapshotEntry};
use crate::counter::{Counter, CounterHandle};
use crate::exposition::encode;
use crate::gauge::{Gauge, GaugeHandle};
use crate::histogram::{Histogram, HistogramHandle};
use crate::label::LabelSet;
use crate::summary::{Summary, SummaryHandle};

struct Definition {
    // Sorted label names, fixed by the first non-empty label set used with the metric.
    schema: Option<Vec<String>>,
    metric: MetricEntry,
}

struct Inner {
    metrics: Mutex<IndexMap<String, Definition>>,
    descriptions: RwLock<HashMap<String, String>>,
    config: RegistryConfig,
}

/// A handle to any kind of metric, as accepted by [`Registry::unregister`].
#[derive(Clone, Debug)]
pub enum Handle {
    /// A counter handle.
    Counter(CounterHandle),
    /// A gauge handle.
    Gauge(GaugeHandle),
    /// A histogram handle.
    Histogram(HistogramHandle),
    /// A summary handle.
    Summary(SummaryHandle),
}

impl Handle {
    fn name(&self) -> &str {
        match self {
            Handle::Counter(handle) => handle.name(),
            Handle::Gauge(handle) => handle.name(),
            Handle::Histogram(handle) => handle.name(),
            Handle::Summary(handle) => handle.name(),
        }
    }

    fn labels(&self) -> &LabelSet {
        match self {
            Handle::Counter(handle) => handle.labels(),
            Handle::Gauge(handle) => handle.labels(),
            Handle::Histogram(handle) => handle.labels(),
            Handle::Summary(handle) => handle.labels(),
        }
    }

    fn entry(&self) -> MetricEntry {
        match self {
            Handle::Counter(handle) => MetricEntry::Counter(Arc::clone(handle.counter())),
            Handle::Gauge(handle) => MetricEntry::Gauge(Arc::clone(handle.gauge())),
            Handle::Histogram(handle) => MetricEntry::Histogram(Arc::clone(handle.histogram())),
            Handle::Summary(handle) => MetricEntry::Summary(Arc::clone(handle.summary())),
        }
    }

    fn detach(&self) -> bool {
        match self {
            Handle::Counter(handle) => handle.detach(),
            Handle::Gauge(handle) => handle.detach(),
            Handle::Histogram(handle) => handle.detach(),
            Handle::Summary(handle) => handle.detach(),
        }
    }
}

impl From<CounterHandle> for Handle {
    fn from(handle: CounterHandle) -> Self {
        Handle::Counter(handle)
    }
}

impl From<GaugeHandle> for Handle {
    fn from(handle: GaugeHandle) -> Self {
        Handle::Gauge(handle)
    }
}

impl From<HistogramHandle> for Handle {
    fn from(handle: HistogramHandle) -> Self {
        Handle::Histogram(handle)
    }
}

impl From<SummaryHandle> for Handle {
    fn from(handle: SummaryHandle) -> Self {
        Handle::Summary(handle)
    }
}

/// A thread-safe registry of dimensional metrics.
///
/// Every metric is identified by its name, which is bound to a metric kind, a set of label names,
/// and, for histograms and summaries, their bucket bounds or quantiles when it is first
/// registered.  Registering the same name again with the same settings hands out a handle to the
/// same metric; registering it with different settings fails.
///
/// `Registry` is a cheap handle to shared state: clones refer to the same set of metrics.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    /// Creates a new [`Registry`] with the default configuration.
    ///
    /// See [`RegistryBuilder`] to change it.
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    pub(crate) fn from_config(config: RegistryConfig) -> Self {
        let inner = Inner {
            metrics: Mutex::new(IndexMap::new()),
            descriptions: RwLock::new(HashMap::new()),
            config,
        };
        Registry { inner: Arc::new(inner) }
    }

    /// Gets or registers the counter `name`, and returns a handle to its `labels` instance.
    ///
    /// An empty `labels` addresses the unlabeled instance.
    ///
    /// # Errors
    ///
    /// Fails if `name` is already registered as another kind of metric, or with other label names.
    pub fn make_counter(&self, name: &str, labels: &LabelSet) -> Result<CounterHandle, RegistryError> {
        self.register(
            name,
            labels,
            MetricKind::Counter,
            || Ok(MetricEntry::Counter(Arc::new(Counter::new(name)))),
            |entry| match entry {
                MetricEntry::Counter(counter) => {
                    Ok(CounterHandle::new(Arc::clone(counter), labels.clone()))
                }
                other => Err(kind_mismatch(name, other.kind(), MetricKind::Counter)),
            },
        )
    }

    /// Gets or registers the gauge `name`, and returns a handle to its `labels` instance.
    ///
    /// An empty `labels` addresses the unlabeled instance.
    ///
    /// # Errors
    ///
    /// Fails if `name` is already registered as another kind of metric, or with other label names.
    pub fn make_gauge(&self, name: &str, labels: &LabelSet) -> Result<GaugeHandle, RegistryError> {
        self.register(
            name,
            labels,
            MetricKind::Gauge,
            || Ok(MetricEntry::Gauge(Arc::new(Gauge::new(name)))),
            |entry| match entry {
                MetricEntry::Gauge(gauge) => Ok(GaugeHandle::new(Arc::clone(gauge), labels.clone())),
                other => Err(kind_mismatch(name, other.kind(), MetricKind::Gauge)),
            },
        )
    }

    /// Gets or registers the histogram `name`, and returns a handle to its `labels` instance.
    ///
    /// `bounds` are the upper bounds of the buckets, in strictly ascending order.  A `+Inf` bucket
    /// is appended if it is missing.
    ///
    /// # Errors
    ///
    /// Fails if `bounds` is invalid, or if `name` is already registered as another kind of metric,
    /// with other label names, or with other bucket bounds.
    pub fn make_histogram(
        &self,
        name: &str,
        labels: &LabelSet,
        bounds: &[f64],
    ) -> Result<HistogramHandle, RegistryError> {
        let template = Buckets::new(bounds);
        let invalid =
            || RegistryError::InvalidBuckets { name: name.to_owned(), buckets: bounds.to_vec() };

        self.register(
            name,
            labels,
            MetricKind::Histogram,
            || {
                let template = template.clone().ok_or_else(invalid)?;
                Ok(MetricEntry::Histogram(Arc::new(Histogram::new(name, template))))
            },
            |entry| match entry {
                MetricEntry::Histogram(histogram) => {
                    let requested = template.as_ref().ok_or_else(invalid)?;
                    if histogram.bounds() != requested.bounds() {
                        return Err(RegistryError::BucketsMismatch {
                            name: name.to_owned(),
                            existing: histogram.bounds().to_vec(),
                            requested: requested.bounds().to_vec(),
                        });
                    }
                    Ok(HistogramHandle::new(Arc::clone(histogram), labels.clone()))
                }
                other => Err(kind_mismatch(name, other.kind(), MetricKind::Histogram)),
            },
        )
    }

    /// Gets or registers the summary `name`, and returns a handle to its `labels` instance.
    ///
    /// `quantiles` are the quantiles estimated and exported for every instance.  They are clamped
    /// to the `[0, 1]` range.
    ///
    /// # Errors
    ///
    /// Fails if `name` is already registered as another kind of metric, with other label names,
    /// or with other quantiles.
    pub fn make_summary(
        &self,
        name: &str,
        labels: &LabelSet,
        quantiles: &[f64],
    ) -> Result<SummaryHandle, RegistryError> {
        let requested = parse_quantiles(quantiles);
        let config = &self.inner.config;

        self.register(
            name,
            labels,
            MetricKind::Summary,
            || Ok(MetricEntry::Summary(Arc::new(Summary::new(name, requested.clone(), config)))),
            |entry| match entry {
                MetricEntry::Summary(summary) => {
                    if summary.quantiles() != requested.as_slice() {
                        return Err(RegistryError::QuantilesMismatch {
                            name: name.to_owned(),
                            existing: summary.quantiles().iter().map(|q| q.value()).collect(),
                            requested: requested.iter().map(|q| q.value()).collect(),
                        });
                    }
                    Ok(SummaryHandle::new(Arc::clone(summary), labels.clone()))
                }
                other => Err(kind_mismatch(name, other.kind(), MetricKind::Summary)),
            },
        )
    }

    fn register<H, C, B>(
        &self,
        name: &str,
        labels: &LabelSet,
        kind: MetricKind,
        create: C,
        bind: B,
    ) -> Result<H, RegistryError>
    where
        C: FnOnce() -> Result<MetricEntry, RegistryError>,
        B: FnOnce(&MetricEntry) -> Result<H, RegistryError>,
    {
        let mut metrics = self.inner.metrics.lock();

        let result = match metrics.entry(name.to_owned()) {
            Entry::Occupied(mut occupied) => {
                bind_existing(occupied.get_mut(), name, labels, kind, bind)
            }
            Entry::Vacant(vacant) => create().and_then(|metric| {
                let handle = bind(&metric)?;
                let schema = (!labels.is_empty()).then(|| labels.schema());
                vacant.insert(Definition { schema, metric });
                tracing::debug!(%name, %kind, "registered metric");
                Ok(handle)
            }),
        };

        if let Err(e) = &result {
            tracing::error!(%name, %kind, error = %e, "failed to register metric");
        }
        result
    }

    /// Unregisters the metric instance that `handle` is bound to.
    ///
    /// Only that instance is removed: unregistering a labeled handle leaves the other labeled
    /// instances and the unlabeled one alone, and unregistering an unlabeled handle resets the
    /// unlabeled instance while keeping every labeled one.  Once no instance of the metric is left,
    /// the metric itself is dropped, and its name may be registered again with any settings.
    ///
    /// Nothing is removed unless the instance is still the one registered: unregistering twice, or
    /// unregistering a handle whose instance has since been replaced, does nothing.  Handles keep
    /// working after being unregistered, but their values are no longer exported.
    pub fn unregister(&self, handle: impl Into<Handle>) {
        let handle = handle.into();
        let name = handle.name();
        let labels = handle.labels();

        let mut metrics = self.inner.metrics.lock();
        let registered = metrics
            .get(name)
            .map_or(false, |definition| definition.metric.ptr_eq(&handle.entry()));

        let removed = registered && handle.detach();
        let dropped = removed
            && metrics.get(name).map_or(false, |definition| definition.metric.is_vacant());
        if dropped {
            metrics.shift_remove(name);
        }

        tracing::trace!(%name, %labels, removed, dropped, "unregistered metric");
    }

    /// Describes the metric `name`.
    ///
    /// The description is exported as the metric's `# HELP` line.  Only the first description of a
    /// name is kept; a name may be described before it is registered.
    pub fn describe(&self, name: &str, help: &str) {
        let mut descriptions = self.inner.descriptions.write();
        descriptions.entry(name.to_owned()).or_insert_with(|| help.to_owned());
    }

    /// Gets the metric registered as `name`, if any.
    pub fn get(&self, name: &str) -> Option<MetricEntry> {
        self.inner.metrics.lock().get(name).map(|definition| definition.metric.clone())
    }

    /// Takes a snapshot of the registered metrics.
    ///
    /// The registry lock is only held while copying references to the metrics, so rendering the
    /// snapshot never blocks callers registering metrics.
    pub fn snapshot(&self) -> Snapshot {
        let mut entries = {
            let metrics = self.inner.metrics.lock();
            let descriptions = self.inner.descriptions.read();
            metrics
                .iter()
                .map(|(name, definition)| SnapshotEntry {
                    help: descriptions.get(name).cloned(),
                    metric: definition.metric.clone(),
                })
                .collect::<Vec<_>>()
        };

        if self.inner.config.sort_output {
            entries.sort_by(|a, b| a.name().cmp(b.name()));
        }

        Snapshot { entries }
    }

    /// Renders every registered metric in the Prometheus exposition format.
    pub fn render(&self) -> String {
        encode(&self.snapshot())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

fn bind_existing<H, B>(
    definition: &mut Definition,
    name: &str,
    labels: &LabelSet,
    kind: MetricKind,
    bind: B,
) -> Result<H, RegistryError>
where
    B: FnOnce(&MetricEntry) -> Result<H, RegistryError>,
{
    let existing = definition.metric.kind();
    if existing != kind {
        return Err(kind_mismatch(name, existing, kind));
    }

    if labels.is_empty() {
        return bind(&definition.metric);
    }

    let requested = labels.schema();
    match &definition.schema {
        Some(schema) if *schema != requested => Err(RegistryError::LabelSchemaMismatch {
            name: name.to_owned(),
            existing: schema.clone(),
            requested,
        }),
        Some(_) => bind(&definition.metric),
        None => {
            let handle = bind(&definition.metric)?;
            definition.schema = Some(requested);
            Ok(handle)
        }
    }
}

fn kind_mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> RegistryError {
    RegistryError::KindMismatch { name: name.to_owned(), existing, requested }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{LabelSet, MetricKind, RegistryError};

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        LabelSet::new(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_schema_is_fixed_by_first_labeled_use() {
        let registry = Registry::new();
        registry.make_counter("requests", &LabelSet::empty()).unwrap();
        registry.make_counter("requests", &labels(&[("route", "/a")])).unwrap();

        let result = registry.make_counter("requests", &labels(&[("method", "GET")]));
        assert_eq!(
            result.unwrap_err(),
            RegistryError::LabelSchemaMismatch {
                name: "requests".to_owned(),
                existing: vec!["route".to_owned()],
                requested: vec!["method".to_owned()],
            }
        );

        // The schema is order-independent, and the unlabeled slot is always available.
        registry.make_counter("pairs", &labels(&[("a", "1"), ("b", "2")])).unwrap();
        assert!(registry.make_counter("pairs", &labels(&[("b", "3"), ("a", "4")])).is_ok());
        assert!(registry.make_counter("pairs", &LabelSet::empty()).is_ok());
    }

    #[test]
    fn test_failed_registration_does_not_fix_schema() {
        let registry = Registry::new();
        registry.make_histogram("latency", &LabelSet::empty(), &[1.0]).unwrap();

        let result = registry.make_histogram("latency", &labels(&[("route", "/a")]), &[2.0]);
        assert!(matches!(result, Err(RegistryError::BucketsMismatch { .. })));

        assert!(registry.make_histogram("latency", &labels(&[("method", "GET")]), &[1.0]).is_ok());
    }

    #[test]
    fn test_kind_is_checked_before_configuration() {
        let registry = Registry::new();
        registry.make_gauge("depth", &LabelSet::empty()).unwrap();

        let result = registry.make_histogram("depth", &LabelSet::empty(), &[2.0, 1.0]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::KindMismatch {
                name: "depth".to_owned(),
                existing: MetricKind::Gauge,
                requested: MetricKind::Histogram,
            }
        );
    }

    #[test]
    fn test_invalid_buckets_register_nothing() {
        let registry = Registry::new();
        let result = registry.make_histogram("latency", &LabelSet::empty(), &[1.0, f64::NAN]);
        assert!(matches!(result, Err(RegistryError::InvalidBuckets { .. })));
        assert!(registry.get("latency").is_none());

        // Omitting `+Inf` and spelling it out are the same configuration.
        registry.make_histogram("latency", &LabelSet::empty(), &[1.0]).unwrap();
        assert!(registry
            .make_histogram("latency", &LabelSet::empty(), &[1.0, f64::INFINITY])
            .is_ok());
    }

    #[test]
    fn test_summary_quantiles_must_match() {
        let registry = Registry::new();
        registry.make_summary("rpc", &LabelSet::empty(), &[0.5, 0.99]).unwrap();
        assert!(registry.make_summary("rpc", &LabelSet::empty(), &[0.5, 0.99]).is_ok());

        let result = registry.make_summary("rpc", &LabelSet::empty(), &[0.5]);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::QuantilesMismatch {
                name: "rpc".to_owned(),
                existing: vec![0.5, 0.99],
                requested: vec![0.5],
            }
        );
    }

    #[test]
    fn test_unregister_unlabeled_frees_name() {
        let registry = Registry::new();
        let counter = registry.make_counter("jobs", &LabelSet::empty()).unwrap();
        counter.increment(1.0);

        registry.unregister(counter.clone());
        assert!(registry.get("jobs").is_none());
        assert!(registry.make_gauge("jobs", &LabelSet::empty()).is_ok());

        // The stale handle neither errors nor removes the new metric.
        registry.unregister(counter);
        assert_eq!(registry.get("jobs").map(|m| m.kind()), Some(MetricKind::Gauge));
    }

    #[test]
    fn test_unregister_unlabeled_keeps_labeled_siblings() {
        let registry = Registry::new();
        registry.make_counter("hits", &labels(&[("route", "/a")])).unwrap().increment(7.0);
        let unlabeled = registry.make_counter("hits", &LabelSet::empty()).unwrap();
        unlabeled.increment(1.0);

        registry.unregister(unlabeled.clone());
        assert_eq!(registry.render(), "# TYPE hits counter\nhits{route=\"/a\"} 7\n");

        // The unlabeled slot starts over, and the stale handle no longer reaches it.
        let fresh = registry.make_counter("hits", &LabelSet::empty()).unwrap();
        assert_eq!(fresh.read(), 0.0);
        registry.unregister(unlabeled);
        fresh.increment(2.0);
        assert_eq!(registry.render(), "# TYPE hits counter\nhits 2\nhits{route=\"/a\"} 7\n");
    }

    #[test]
    fn test_metric_dropped_once_every_instance_is_unregistered() {
        let registry = Registry::new();
        let labeled = registry.make_gauge("depth", &labels(&[("queue", "q1")])).unwrap();
        let unlabeled = registry.make_gauge("depth", &LabelSet::empty()).unwrap();

        registry.unregister(unlabeled);
        assert!(registry.get("depth").is_some());

        registry.unregister(labeled);
        assert!(registry.get("depth").is_none());
        assert!(registry.make_counter("depth", &LabelSet::empty()).is_ok());
    }

    #[test]
    fn test_describe_first_wins() {
        let registry = Registry::new();
        registry.describe("hits", "total hits");
        registry.describe("hits", "something else");
        registry.make_counter("hits", &LabelSet::empty()).unwrap().increment(5.0);

        let snapshot = registry.snapshot();
        let entry = snapshot.iter().next().expect("one metric");
        assert_eq!(entry.help(), Some("total hits"));
        assert_eq!(entry.kind(), MetricKind::Counter);
    }
}
