use super::{Optimizer, Result, SizeMismatchErr};

/// Vanilla fixed-step gradient descent.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    ///
    /// # Returns
    /// A new `GradientDescent` instance.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Returns the learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for GradientDescent {
    fn update_weights(&mut self, grad: &[f64], weights: &mut [f64]) -> Result<()> {
        if grad.len() != weights.len() {
            return Err(SizeMismatchErr);
        }

        let lr = self.learning_rate;

        for (w, g) in weights.iter_mut().zip(grad) {
            *w -= lr * g;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_gradient() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut weights = [1.0, 2.0, 3.0];

        optimizer.update_weights(&[2.0, -2.0, 0.0], &mut weights).unwrap();
        assert_eq!(weights, [0.0, 3.0, 3.0]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut weights = [1.0, 2.0];

        assert!(optimizer.update_weights(&[1.0], &mut weights).is_err());
        assert_eq!(weights, [1.0, 2.0]);
    }
}
