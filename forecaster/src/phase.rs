use state_store::{State, WINDOW_LEN, WINDOW_SENTINEL};

/// The cycle at which the first target is captured.
pub const TARGET_CYCLE: u64 = WINDOW_LEN as u64;

/// Where a cycle falls in the update's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Cycles before the window is full, the feature lands at `position`.
    WarmUp { position: usize },
    /// The cycle right after the window is full, the feature becomes the first target.
    CaptureTarget,
    /// Every later cycle, the window slides and the model refits unless frozen.
    SteadyState { training: bool },
}

impl Phase {
    /// Determines the phase of `cycle`.
    ///
    /// # Arguments
    /// * `cycle` - The current cycle index.
    /// * `training_cutoff` - The first cycle at which refitting no longer happens.
    ///
    /// # Returns
    /// The phase the cycle belongs to.
    pub fn of(cycle: u64, training_cutoff: Option<u64>) -> Self {
        if cycle < TARGET_CYCLE {
            return Self::WarmUp {
                position: cycle as usize,
            };
        }

        if cycle == TARGET_CYCLE {
            return Self::CaptureTarget;
        }

        let training = training_cutoff.is_none_or(|cutoff| cycle < cutoff);
        Self::SteadyState { training }
    }

    /// Returns `true` if the model gets refitted during this phase.
    pub fn trains(self) -> bool {
        matches!(self, Self::SteadyState { training: true })
    }

    /// Records `feature` into the window and target as this phase dictates.
    pub fn advance(self, state: &mut State, feature: f64) {
        match self {
            Self::WarmUp { position } => {
                if let Some(slot) = state.window.get_mut(position) {
                    *slot = feature;
                }
            }
            Self::CaptureTarget => state.target = feature,
            Self::SteadyState { .. } => {
                slide(&mut state.window, state.target);
                state.target = feature;
            }
        }
    }
}

/// Drops the oldest window entry and appends `previous_target` as the most recent one.
///
/// The first position always holds the sentinel.
pub fn slide(window: &mut [f64; WINDOW_LEN], previous_target: f64) {
    window.copy_within(2.., 1);
    window[0] = WINDOW_SENTINEL;
    window[WINDOW_LEN - 1] = previous_target;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_boundaries() {
        assert_eq!(Phase::of(0, None), Phase::WarmUp { position: 0 });
        assert_eq!(Phase::of(4, None), Phase::WarmUp { position: 4 });
        assert_eq!(Phase::of(5, None), Phase::CaptureTarget);
        assert_eq!(Phase::of(6, None), Phase::SteadyState { training: true });
        assert_eq!(Phase::of(1_000_000, None), Phase::SteadyState { training: true });
    }

    #[test]
    fn training_cutoff() {
        assert!(Phase::of(399, Some(400)).trains());
        assert!(!Phase::of(400, Some(400)).trains());
        assert!(!Phase::of(900, Some(400)).trains());
        assert!(!Phase::of(3, None).trains());
        assert!(!Phase::of(5, None).trains());
    }

    #[test]
    fn slide_window() {
        let mut window = [2.0, 4.0, 6.0, 8.0, 10.0];
        slide(&mut window, 12.0);
        assert_eq!(window, [1.0, 6.0, 8.0, 10.0, 12.0]);

        slide(&mut window, 14.0);
        assert_eq!(window, [1.0, 8.0, 10.0, 12.0, 14.0]);
    }

    #[test]
    fn advance_steady_state() {
        let mut state = State {
            window: [2.0, 4.0, 6.0, 8.0, 10.0],
            target: 12.0,
            weights: [0.1; WINDOW_LEN],
        };

        Phase::SteadyState { training: false }.advance(&mut state, 14.0);
        assert_eq!(state.window, [1.0, 6.0, 8.0, 10.0, 12.0]);
        assert_eq!(state.target, 14.0);
        assert_eq!(state.weights, [0.1; WINDOW_LEN]);
    }

    #[test]
    fn advance_warm_up_and_capture() {
        let mut state = State::default();

        Phase::WarmUp { position: 3 }.advance(&mut state, 7.0);
        assert_eq!(state.window, [1.0, 0.0, 0.0, 7.0, 0.0]);

        Phase::CaptureTarget.advance(&mut state, 9.0);
        assert_eq!(state.window, [1.0, 0.0, 0.0, 7.0, 0.0]);
        assert_eq!(state.target, 9.0);
    }

    #[test]
    fn out_of_range_position_is_ignored() {
        let mut state = State::default();
        Phase::WarmUp { position: 17 }.advance(&mut state, 7.0);
        assert_eq!(state, State::default());
    }
}
