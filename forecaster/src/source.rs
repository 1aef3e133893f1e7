/// Supplies the per-cycle input of the update.
///
/// Implementations hand out data that's already resident in memory, calls must not block.
pub trait FeatureSource {
    /// Returns the index of the current simulation cycle.
    fn current_cycle(&self) -> u64;

    /// Returns the scalar feature of the current cycle, `None` if it's missing.
    fn current_feature(&self) -> Option<f64>;
}

impl<F: FeatureSource + ?Sized> FeatureSource for &F {
    fn current_cycle(&self) -> u64 {
        (**self).current_cycle()
    }

    fn current_feature(&self) -> Option<f64> {
        (**self).current_feature()
    }
}

impl<F: FeatureSource + ?Sized> FeatureSource for &mut F {
    fn current_cycle(&self) -> u64 {
        (**self).current_cycle()
    }

    fn current_feature(&self) -> Option<f64> {
        (**self).current_feature()
    }
}

/// The field values of a single cycle, its feature is the field maximum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSnapshot {
    cycle: u64,
    values: Vec<f64>,
}

impl FieldSnapshot {
    /// Creates a new `FieldSnapshot`.
    ///
    /// # Arguments
    /// * `cycle` - The cycle the values belong to.
    /// * `values` - The field component values extracted from the mesh.
    ///
    /// # Returns
    /// A new `FieldSnapshot` instance.
    pub fn new(cycle: u64, values: Vec<f64>) -> Self {
        Self { cycle, values }
    }

    /// Replaces the snapshot with the values of a new cycle.
    pub fn replace(&mut self, cycle: u64, values: Vec<f64>) {
        self.cycle = cycle;
        self.values = values;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl FeatureSource for FieldSnapshot {
    fn current_cycle(&self) -> u64 {
        self.cycle
    }

    /// An empty field has no feature and a field holding a NaN yields NaN.
    fn current_feature(&self) -> Option<f64> {
        if self.values.iter().any(|v| v.is_nan()) {
            return Some(f64::NAN);
        }

        self.values.iter().copied().reduce(f64::max)
    }
}
