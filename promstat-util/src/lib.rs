//! Accumulation algorithms behind the `promstat` metric types.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod histogram;
pub use histogram::{exponential_buckets, linear_buckets, Histogram, DEFAULT_BUCKETS};

mod kind;
pub use kind::MetricKind;

mod quantile;
pub use quantile::{parse_quantiles, Quantile};

mod summary;
pub use summary::Summary;
