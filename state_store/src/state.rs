use serde::{Deserialize, Serialize};

/// Amount of lagged features the model looks at.
pub const WINDOW_LEN: usize = 5;

/// The sentinel stored at the oldest window position.
pub const WINDOW_SENTINEL: f64 = 1.0;

/// Initial value of every model weight when no state has been persisted yet.
pub const DEFAULT_INITIAL_WEIGHT: f64 = 0.1;

/// The unit of persistence: the feature window, the training target and the model weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Recent features, most recent last.
    pub window: [f64; WINDOW_LEN],
    /// The value the model is trained to predict.
    pub target: f64,
    /// One weight per window position.
    pub weights: [f64; WINDOW_LEN],
}

impl State {
    /// Creates the default state with every weight set to `initial_weight`.
    ///
    /// # Arguments
    /// * `initial_weight` - The uniform starting value of the model weights.
    ///
    /// # Returns
    /// A state with window `[1, 0, 0, 0, 0]` and a zero target.
    pub fn with_initial_weight(initial_weight: f64) -> Self {
        let mut window = [0.0; WINDOW_LEN];
        window[0] = WINDOW_SENTINEL;

        Self {
            window,
            target: 0.0,
            weights: [initial_weight; WINDOW_LEN],
        }
    }

    /// Returns `true` if every scalar in the state is finite.
    pub fn is_finite(&self) -> bool {
        self.window
            .iter()
            .chain(&self.weights)
            .chain(std::iter::once(&self.target))
            .all(|x| x.is_finite())
    }
}

impl Default for State {
    fn default() -> Self {
        Self::with_initial_weight(DEFAULT_INITIAL_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state() {
        let state = State::default();

        assert_eq!(state.window, [1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(state.target, 0.0);
        assert_eq!(state.weights, [0.1; WINDOW_LEN]);
    }

    #[test]
    fn custom_initial_weight() {
        let state = State::with_initial_weight(0.05);
        assert_eq!(state.weights, [0.05; WINDOW_LEN]);
    }

    #[test]
    fn non_finite_detection() {
        let mut state = State::default();
        assert!(state.is_finite());

        state.target = f64::NAN;
        assert!(!state.is_finite());

        state.target = 0.0;
        state.weights[3] = f64::INFINITY;
        assert!(!state.is_finite());
    }
}
