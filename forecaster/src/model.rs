//! The linear predictor over the lagged feature window and its squared-error refit.

use state_store::{State, WINDOW_LEN};

use crate::optimization::{Optimizer, Result};

/// Predicts the next feature as the dot product of the weights and the window.
pub fn predict(weights: &[f64; WINDOW_LEN], window: &[f64; WINDOW_LEN]) -> f64 {
    weights.iter().zip(window).map(|(w, x)| w * x).sum()
}

/// Squared error of the current prediction against the state's target.
pub fn squared_error(state: &State) -> f64 {
    (state.target - predict(&state.weights, &state.window)).powi(2)
}

/// Writes the gradient of the half squared error with respect to the weights into `grad`.
///
/// `grad[i] = window[i] * (prediction - target)`
pub fn gradient(state: &State, grad: &mut [f64; WINDOW_LEN]) {
    let residual = predict(&state.weights, &state.window) - state.target;

    grad.iter_mut()
        .zip(&state.window)
        .for_each(|(g, x)| *g = x * residual);
}

/// Runs `epochs` optimizer steps of the weights against the state's window and target.
///
/// The window and target are left untouched, every epoch sees the same sample.
///
/// # Arguments
/// * `state` - The state whose weights get refitted.
/// * `optimizer` - The optimizer applying each gradient.
/// * `epochs` - The amount of steps to run.
/// * `on_epoch` - Called after every step with the epoch index and its squared error.
///
/// # Returns
/// A `SizeMismatchErr` if the optimizer rejects the gradient.
pub fn refit<O, E>(
    state: &mut State,
    optimizer: &mut O,
    epochs: usize,
    mut on_epoch: E,
) -> Result<()>
where
    O: Optimizer,
    E: FnMut(usize, f64),
{
    let mut grad = [0.0; WINDOW_LEN];

    for epoch in 0..epochs {
        gradient(state, &mut grad);
        optimizer.update_weights(&grad, &mut state.weights)?;
        on_epoch(epoch, squared_error(state));
    }

    Ok(())
}
