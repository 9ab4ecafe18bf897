//! A concurrent registry of dimensional Prometheus metrics.
//!
//! Counters, gauges, histograms, and summaries are registered by name in a [`Registry`], which
//! hands out cheap handles bound to one labeled (or the unlabeled) instance of a metric.  The whole
//! registry can then be rendered in the Prometheus text exposition format.
//!
//! ```
//! use promstat::{LabelSet, Registry};
//!
//! let registry = Registry::new();
//! registry.describe("hits", "total hits");
//!
//! let hits = registry.make_counter("hits", &LabelSet::empty()).unwrap();
//! hits.increment(5.0);
//!
//! assert_eq!(registry.render(), "# HELP hits total hits\n# TYPE hits counter\nhits 5\n");
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
pub use self::builder::RegistryBuilder;

mod common;
pub use self::common::{
    LabelSetError, MetricEntry, RegistryError, Snapshot, SnapshotEntry, TimeUnit,
};

mod counter;
pub use self::counter::{Counter, CounterHandle};

mod exposition;
pub use self::exposition::encode;

mod family;

pub mod formatting;

mod gauge;
pub use self::gauge::{Gauge, GaugeHandle};

mod histogram;
pub use self::histogram::{Histogram, HistogramHandle, HistogramTimer};

mod label;
pub use self::label::{Label, LabelSet};

mod registry;
pub use self::registry::{Handle, Registry};

mod summary;
pub use self::summary::{Summary, SummaryHandle, SummaryTimer};

pub use promstat_util::{
    exponential_buckets, linear_buckets, MetricKind, Quantile, DEFAULT_BUCKETS,
};
