use super::Result;

/// Defines the strategy for updating model weights based on a computed gradient.
pub trait Optimizer {
    /// Updates the provided slice of weights using the gradient.
    ///
    /// # Arguments
    /// * `grad` - A reference to the model's gradient.
    /// * `weights` - The weights to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `weights`.
    fn update_weights(&mut self, grad: &[f64], weights: &mut [f64]) -> Result<()>;
}
