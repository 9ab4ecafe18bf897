use crate::common::TimeUnit;
use crate::registry::Registry;

/// Settings shared by every metric created through a registry.
#[derive(Clone, Debug)]
pub(crate) struct RegistryConfig {
    pub summary_error: f64,
    pub summary_max_bins: u32,
    pub summary_min_value: f64,
    pub default_time_unit: TimeUnit,
    pub sort_output: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            summary_error: 0.0001,
            summary_max_bins: 32_768,
            summary_min_value: 1.0e-9,
            default_time_unit: TimeUnit::Seconds,
            sort_output: true,
        }
    }
}

/// Builder for creating a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    config: RegistryConfig,
}

impl RegistryBuilder {
    /// Creates a new [`RegistryBuilder`].
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Sets the relative error of the quantile sketch backing summaries.
    ///
    /// An error of 0.001 means an estimate lies within 0.1% of the true value at that quantile.
    ///
    /// Defaults to 0.0001.
    pub fn summary_error(mut self, alpha: f64) -> Self {
        self.config.summary_error = alpha;
        self
    }

    /// Sets the maximum number of bins kept by each side of a summary's quantile sketch.
    ///
    /// Each bin costs eight bytes, which bounds the memory used by a summary instance no matter
    /// how many values it observes.
    ///
    /// Defaults to 32,768.
    pub fn summary_max_bins(mut self, max_bins: u32) -> Self {
        self.config.summary_max_bins = max_bins;
        self
    }

    /// Sets the smallest magnitude that summaries distinguish from zero.
    ///
    /// Defaults to 1.0e-9.
    pub fn summary_min_value(mut self, min_value: f64) -> Self {
        self.config.summary_min_value = min_value;
        self
    }

    /// Sets the unit that newly-created summaries convert durations to.
    ///
    /// Defaults to seconds.
    pub fn default_time_unit(mut self, unit: TimeUnit) -> Self {
        self.config.default_time_unit = unit;
        self
    }

    /// Sets whether metrics are exported sorted by name, or in the order they were registered.
    ///
    /// Defaults to `true`.
    pub fn sort_output(mut self, sort: bool) -> Self {
        self.config.sort_output = sort;
        self
    }

    /// Builds the [`Registry`].
    pub fn build(self) -> Registry {
        Registry::from_config(self.config)
    }
}
