use sketches_ddsketch::{Config, DDSketch};

/// A quantile sketch with relative-error guarantees.
///
/// Based on [DDSketch][ddsketch], `Summary` provides quantiles over an arbitrary distribution of
/// floating-point numbers, including negative numbers, using a space-efficient sketch that
/// provides relative-error guarantees regardless of the absolute range between the smallest and
/// largest values.
///
/// Values are split into three bands: negative values and positive values each go into their own
/// sketch (keyed by magnitude), and values whose magnitude is at or below `min_value` are counted
/// as zeroes.  Non-finite values are ignored.
///
/// Memory usage is bounded by `max_buckets` per sketch, no matter how many samples are added.
///
/// Estimates are clamped to the smallest and largest value seen in the band they fall in, so for
/// any fixed state of the summary, a larger quantile never yields a smaller estimate.
///
/// [ddsketch]: https://arxiv.org/abs/1908.10693
#[derive(Clone)]
pub struct Summary {
    negative: DDSketch,
    positive: DDSketch,
    min_value: f64,
    zeroes: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Summary {
    /// Creates a new [`Summary`].
    ///
    /// `alpha` represents the desired relative error for this summary.  If `alpha` was 0.001, that
    /// would represent a desired relative error of 0.1%.  For example, if the true value at
    /// quantile q0 was 1, the estimated value at that quantile would be a value within 0.1% of the
    /// true value, or a value between 0.999 and 1.001.
    ///
    /// `max_buckets` controls how many subbuckets are created, which directly influences memory
    /// usage.  Each bucket "costs" eight bytes, so a summary with 2048 buckets would consume a
    /// maximum of around 16 KiB per sign.  Depending on how many samples have been added to the
    /// summary, the number of subbuckets allocated may be far below `max_buckets`.
    ///
    /// `min_value` controls the smallest value that will be recognized distinctly from zero.  Said
    /// another way, any value between `-min_value` and `min_value` will be counted as zero.
    pub fn new(alpha: f64, max_buckets: u32, min_value: f64) -> Summary {
        let config = Config::new(alpha, max_buckets, min_value.abs());

        Summary {
            negative: DDSketch::new(config.clone()),
            positive: DDSketch::new(config),
            min_value: min_value.abs(),
            zeroes: 0,
            min: None,
            max: None,
        }
    }

    /// Creates a new [`Summary`] with default values.
    ///
    /// `alpha` is 0.0001, `max_buckets` is 32,768, and `min_value` is 1.0e-9.
    ///
    /// This will yield a summary that is roughly equivalent in memory usage to an HDRHistogram with
    /// 3 significant digits, and will support values down to a single nanosecond.
    pub fn with_defaults() -> Summary {
        Summary::new(0.0001, 32_768, 1.0e-9)
    }

    /// Adds a sample to the summary.
    ///
    /// Samples that are `NaN` or infinite are ignored.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }

        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));

        let vabs = value.abs();
        if vabs <= self.min_value {
            self.zeroes += 1;
        } else if value > 0.0 {
            self.positive.add(vabs);
        } else {
            self.negative.add(vabs);
        }
    }

    /// Gets the estimated value at the given quantile.
    ///
    /// If the sketch is empty, or if the quantile is less than 0.0 or greater than 1.0, then the
    /// result will be `None`.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if !(0.0..=1.0).contains(&q) {
            return None;
        }

        let ncount = self.negative.count();
        let pcount = self.positive.count();
        let zcount = self.zeroes;
        let total = ncount + pcount + zcount;
        if total == 0 {
            return None;
        }

        // Zero-based rank of the requested sample across all three bands, in ascending order.
        let rank = (q * (total - 1) as f64) as usize;

        if rank < ncount {
            // Negative values are sketched by magnitude, so ascending rank walks the magnitudes in
            // descending order.
            let nq = band_quantile(ncount - 1 - rank, ncount);
            band_estimate(&self.negative, nq).map(|v| -v)
        } else if rank < ncount + zcount {
            Some(0.0)
        } else {
            let pq = band_quantile(rank - ncount - zcount, pcount);
            band_estimate(&self.positive, pq)
        }
    }

    /// Gets the minimum value this summary has seen so far.
    pub fn min(&self) -> Option<f64> {
        self.min
    }

    /// Gets the maximum value this summary has seen so far.
    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Gets the number of samples in this summary.
    pub fn count(&self) -> usize {
        self.negative.count() + self.positive.count() + self.zeroes
    }

    /// Whether or not this summary is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Estimated size of this summary, in bytes.
    pub fn size(&self) -> usize {
        std::mem::size_of::<Self>() + ((self.positive.length() + self.negative.length()) * 8)
    }
}

fn band_quantile(rank: usize, count: usize) -> f64 {
    if count <= 1 {
        0.0
    } else {
        rank as f64 / (count - 1) as f64
    }
}

fn band_estimate(sketch: &DDSketch, q: f64) -> Option<f64> {
    let estimate = sketch.quantile(q).ok().flatten()?;
    match (sketch.min(), sketch.max()) {
        (Some(min), Some(max)) if min <= max => Some(estimate.clamp(min, max)),
        _ => Some(estimate),
    }
}
