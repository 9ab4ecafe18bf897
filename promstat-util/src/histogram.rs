//! Helper functions and types related to histogram data.

/// Default bucket bounds, matching the ones used by the official Prometheus client libraries.
///
/// They are tailored to broadly measure the response time, in seconds, of a network service.
pub const DEFAULT_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Creates `count` buckets, each `width` wide, where the lowest bucket has an upper bound of
/// `start`.
///
/// Returns `None` if `count` is zero or `width` is not strictly positive.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Option<Vec<f64>> {
    if count == 0 || !(width > 0.0) || !start.is_finite() {
        return None;
    }

    Some((0..count).map(|i| start + width * i as f64).collect())
}

/// Creates `count` buckets, where the lowest bucket has an upper bound of `start` and each
/// following bucket's upper bound is `factor` times the previous one.
///
/// Returns `None` if `count` is zero, `start` is not strictly positive, or `factor` is not greater
/// than one.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Option<Vec<f64>> {
    if count == 0 || !(start > 0.0) || !start.is_finite() || !(factor > 1.0) {
        return None;
    }

    let mut buckets = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        buckets.push(bound);
        bound *= factor;
    }
    Some(buckets)
}

/// A bucketed histogram.
///
/// This histogram tracks the number of samples that fall into pre-defined buckets, rather than
/// exposing any sort of quantiles.
///
/// Each sample is routed to exactly one bucket: the first whose upper bound is greater than or
/// equal to the sample.  Counts are therefore stored per bucket, and only turned into the
/// cumulative "less than or equal to" form expected by Prometheus when they are read via
/// [`buckets`](Histogram::buckets).
///
/// The last bound is always `+Inf`, so every sample lands somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bounds: Vec<f64>,
    buckets: Vec<u64>,
    sum: f64,
}

impl Histogram {
    /// Creates a new `Histogram`.
    ///
    /// If the last bound of `bounds` is not `+Inf`, it is appended.  An empty `bounds` therefore
    /// yields a histogram with the single `+Inf` bucket.
    ///
    /// If `bounds` contains `NaN`, or is not strictly ascending, returns `None`.
    pub fn new(bounds: &[f64]) -> Option<Histogram> {
        if bounds.iter().any(|b| b.is_nan()) {
            return None;
        }
        if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return None;
        }

        let mut bounds = Vec::from(bounds);
        if bounds.last().map_or(true, |last| *last != f64::INFINITY) {
            bounds.push(f64::INFINITY);
        }

        let buckets = vec![0u64; bounds.len()];

        Some(Histogram { bounds, buckets, sum: 0.0 })
    }

    /// Creates a new, empty `Histogram` with the same bounds as this one.
    pub fn empty_like(&self) -> Histogram {
        Histogram { bounds: self.bounds.clone(), buckets: vec![0u64; self.bounds.len()], sum: 0.0 }
    }

    /// Gets the upper bounds of every bucket, in ascending order.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Gets the sum of all samples.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Gets the sample count.
    pub fn count(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Gets the buckets.
    ///
    /// Buckets are tuples, where the first element is the bucket limit itself, and the second
    /// element is the cumulative count of samples less than or equal to that limit.
    pub fn buckets(&self) -> Vec<(f64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .zip(self.buckets.iter())
            .map(|(bound, count)| {
                running += count;
                (*bound, running)
            })
            .collect()
    }

    /// Records a single sample.
    pub fn record(&mut self, sample: f64) {
        self.sum += sample;

        // NaN never compares as less than or equal to anything, so it falls through to `+Inf`.
        let idx =
            self.bounds.iter().position(|bound| sample <= *bound).unwrap_or(self.bounds.len() - 1);
        self.buckets[idx] += 1;
    }

    /// Records multiple samples.
    pub fn record_many<'a, S>(&mut self, samples: S)
    where
        S: IntoIterator<Item = &'a f64> + 'a,
    {
        for sample in samples {
            self.record(*sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{exponential_buckets, linear_buckets, Histogram, DEFAULT_BUCKETS};
    use proptest::prelude::*;

    #[test]
    fn test_histogram() {
        let buckets = &[10.0, 25.0, 100.0];
        let values = vec![3.0, 2.0, 6.0, 12.0, 56.0, 82.0, 202.0, 100.0, 29.0];

        let mut histogram = Histogram::new(buckets).expect("histogram should have been created");

        histogram.record_many(&values);
        histogram.record(89.0);

        let result = histogram.buckets();
        assert_eq!(result.len(), 4);

        assert_eq!(result[0], (10.0, 3));
        assert_eq!(result[1], (25.0, 4));
        assert_eq!(result[2], (100.0, 9));
        assert_eq!(result[3], (f64::INFINITY, 10));

        assert_eq!(histogram.count(), values.len() as u64 + 1);
        assert_eq!(histogram.sum(), 581.0);
    }

    #[test]
    fn test_cumulative_buckets() {
        let mut histogram =
            Histogram::new(&[1.0, 5.0, 10.0, f64::INFINITY]).expect("valid bounds");
        histogram.record_many(&[0.5, 3.0, 3.0, 7.0, 50.0]);

        let counts = histogram.buckets().into_iter().map(|(_, c)| c).collect::<Vec<_>>();
        assert_eq!(counts, vec![1, 3, 4, 5]);
        assert_eq!(histogram.count(), 5);
        assert_eq!(histogram.sum(), 63.5);
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Histogram::new(&[1.0, 1.0]).is_none());
        assert!(Histogram::new(&[5.0, 1.0]).is_none());
        assert!(Histogram::new(&[1.0, f64::NAN]).is_none());

        let empty = Histogram::new(&[]).expect("empty bounds are valid");
        assert_eq!(empty.bounds(), &[f64::INFINITY]);

        let explicit = Histogram::new(&[1.0, f64::INFINITY]).expect("valid bounds");
        let implicit = Histogram::new(&[1.0]).expect("valid bounds");
        assert_eq!(explicit.bounds(), implicit.bounds());
    }

    #[test]
    fn test_bound_is_inclusive() {
        let mut histogram = Histogram::new(&[1.0, 2.0]).expect("valid bounds");
        histogram.record(1.0);
        histogram.record(f64::NAN);

        let buckets = histogram.buckets();
        assert_eq!(buckets[0], (1.0, 1));
        assert_eq!(buckets[1], (2.0, 1));
        assert_eq!(buckets[2], (f64::INFINITY, 2));
    }

    #[test]
    fn test_empty_like() {
        let mut histogram = Histogram::new(&DEFAULT_BUCKETS).expect("valid bounds");
        histogram.record(0.3);

        let fresh = histogram.empty_like();
        assert_eq!(fresh.bounds(), histogram.bounds());
        assert_eq!(fresh.count(), 0);
        assert_eq!(fresh.sum(), 0.0);
    }

    #[test]
    fn test_bucket_generators() {
        assert_eq!(linear_buckets(1.0, 2.0, 3), Some(vec![1.0, 3.0, 5.0]));
        assert_eq!(linear_buckets(1.0, 0.0, 3), None);
        assert_eq!(linear_buckets(1.0, 1.0, 0), None);

        assert_eq!(exponential_buckets(1.0, 2.0, 4), Some(vec![1.0, 2.0, 4.0, 8.0]));
        assert_eq!(exponential_buckets(0.0, 2.0, 4), None);
        assert_eq!(exponential_buckets(1.0, 1.0, 4), None);

        assert!(DEFAULT_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn test_buckets_are_cumulative(samples in prop::collection::vec(-1000.0f64..1000.0, 0..256)) {
            let mut histogram = Histogram::new(&[-100.0, 0.0, 1.0, 50.0, 500.0]).expect("valid bounds");
            histogram.record_many(&samples);

            let buckets = histogram.buckets();
            prop_assert!(buckets.windows(2).all(|w| w[0].1 <= w[1].1));

            for (bound, count) in &buckets {
                let expected = samples.iter().filter(|s| *s <= bound).count() as u64;
                prop_assert_eq!(*count, expected);
            }

            let last = buckets.last().map(|(_, c)| *c).unwrap_or(0);
            prop_assert_eq!(last, samples.len() as u64);
            prop_assert_eq!(histogram.count(), samples.len() as u64);
        }
    }
}
