use std::{f64::consts::TAU, num::NonZeroUsize};

/// A deterministic stand-in for the `u` velocity component of a running simulation.
///
/// Every cycle yields a travelling sine wave over `nodes` mesh points whose amplitude grows
/// linearly with the cycle index.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticField {
    nodes: NonZeroUsize,
    growth: f64,
}

impl SyntheticField {
    /// Creates a new `SyntheticField`.
    ///
    /// # Arguments
    /// * `nodes` - Amount of mesh points per cycle.
    /// * `growth` - Amplitude increase per cycle.
    ///
    /// # Returns
    /// A new `SyntheticField` instance.
    pub fn new(nodes: NonZeroUsize, growth: f64) -> Self {
        Self { nodes, growth }
    }

    /// Returns the field values at `cycle`.
    pub fn values(&self, cycle: u64) -> Vec<f64> {
        let t = cycle as f64;
        let n = self.nodes.get();
        let amplitude = 1.0 + self.growth * t;

        (0..n)
            .map(|i| amplitude * (TAU * i as f64 / n as f64 + 0.1 * t).sin())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> SyntheticField {
        SyntheticField::new(NonZeroUsize::new(64).unwrap(), 0.5)
    }

    #[test]
    fn values_per_node() {
        assert_eq!(field().values(0).len(), 64);
    }

    #[test]
    fn deterministic() {
        assert_eq!(field().values(17), field().values(17));
    }

    #[test]
    fn maximum_tracks_amplitude() {
        let max = |cycle| field().values(cycle).into_iter().reduce(f64::max).unwrap();

        assert!((max(0) - 1.0).abs() < 0.01);
        assert!(max(40) > max(20));
    }
}
