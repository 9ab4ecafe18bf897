/// A quantile target for a summary.
///
/// We work with quantiles for optimal floating-point precision over percentiles, so a quantile of
/// `0.99` is the 99th percentile, and a quantile of `0.999` is the 99.9th percentile.
///
/// All values are clamped between 0.0 and 1.0, and `NaN` is treated as 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile(f64);

impl Quantile {
    /// Creates a new [`Quantile`] from a floating-point value.
    pub fn new(quantile: f64) -> Quantile {
        let clamped = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };
        Quantile(clamped)
    }

    /// Gets the raw quantile value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Parses a slice of floating-point values into a vector of [`Quantile`]s.
pub fn parse_quantiles(quantiles: &[f64]) -> Vec<Quantile> {
    quantiles.iter().map(|f| Quantile::new(*f)).collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_quantiles, Quantile};

    #[test]
    fn test_quantiles() {
        assert_eq!(Quantile::new(0.0).value(), 0.0);
        assert_eq!(Quantile::new(1.0).value(), 1.0);
        assert_eq!(Quantile::new(0.99).value(), 0.99);
        assert_eq!(Quantile::new(0.999).value(), 0.999);

        let under = Quantile::new(-1.0);
        assert_eq!(under.value(), 0.0);

        let over = Quantile::new(1.2);
        assert_eq!(over.value(), 1.0);

        let nan = Quantile::new(f64::NAN);
        assert_eq!(nan.value(), 0.0);
    }

    #[test]
    fn test_parse_quantiles() {
        let empty = vec![];
        let result = parse_quantiles(&empty);
        assert_eq!(result.len(), 0);

        let normal = vec![0.0, 0.5, 0.99, 0.999, 1.0];
        let result = parse_quantiles(&normal);
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], Quantile::new(0.0));
        assert_eq!(result[1], Quantile::new(0.5));
        assert_eq!(result[2], Quantile::new(0.99));
        assert_eq!(result[3], Quantile::new(0.999));
        assert_eq!(result[4], Quantile::new(1.0));
    }
}
