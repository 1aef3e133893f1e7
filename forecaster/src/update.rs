use log::{debug, info, trace, warn};
use state_store::{SharedMemoryStateStore, State, StateStore};

use crate::{
    Result,
    config::UpdateConfig,
    error::UpdateErr,
    model,
    optimization::GradientDescent,
    phase::Phase,
    source::FeatureSource,
};

/// The outcome of a successful update call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport {
    pub cycle: u64,
    pub phase: Phase,
    /// The state as persisted by the call.
    pub state: State,
    /// The normalized squared error of the refitted model.
    pub loss: f64,
    /// `true` if the configured terminal cycle was reached.
    pub terminal: bool,
}

/// The per-cycle online refit of the linear forecaster.
///
/// Every call to `update`:
/// - Reads the cycle and feature from the injected `FeatureSource`.
/// - Loads the state from the `StateStore`.
/// - Advances the window and target, refitting the weights in steady state.
/// - Persists the state back before returning.
///
/// Failures happen before the persist, so the stored state stays as the previous call left it.
///
/// Cycles are expected to start at 0 and increase by one per call. Skipped or repeated
/// cycles are logged and processed on a best-effort basis.
pub struct OnlineForecastUpdate<S, F> {
    store: S,
    source: F,
    config: UpdateConfig,
    last_cycle: Option<u64>,
}

impl<S, F> OnlineForecastUpdate<S, F>
where
    S: StateStore,
    F: FeatureSource,
{
    /// Creates a new `OnlineForecastUpdate`.
    ///
    /// # Arguments
    /// * `store` - Where the state lives between calls.
    /// * `source` - Supplies the cycle index and feature.
    /// * `config` - The update tunables.
    ///
    /// # Returns
    /// A new `OnlineForecastUpdate` instance.
    ///
    /// # Errors
    /// `UpdateErr::Config` if `config` holds invalid values.
    pub fn new(store: S, source: F, config: UpdateConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store,
            source,
            config,
            last_cycle: None,
        })
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the source, for the host to move it to the next cycle.
    pub fn source_mut(&mut self) -> &mut F {
        &mut self.source
    }

    /// Consumes the updater, returning its store and source.
    pub fn into_parts(self) -> (S, F) {
        (self.store, self.source)
    }

    /// Runs the update for the source's current cycle.
    ///
    /// # Returns
    /// The persisted state together with the cycle's phase and loss.
    ///
    /// # Errors
    /// `UpdateErr::InvalidFeature` for a missing or non-finite feature, `UpdateErr::Diverged`
    /// if the refit leaves non-finite weights and `UpdateErr::Store` if the state can't be
    /// loaded or persisted.
    pub fn update(&mut self) -> Result<UpdateReport> {
        let cycle = self.source.current_cycle();
        let feature = match self.source.current_feature() {
            Some(feature) if feature.is_finite() => feature,
            value => return Err(UpdateErr::InvalidFeature { cycle, value }),
        };

        self.check_order(cycle);

        let mut state = self.store.load()?;
        let phase = Phase::of(cycle, self.config.training_cutoff);
        phase.advance(&mut state, feature);
        debug!(cycle = cycle; "phase {phase:?}, feature {feature}");

        let epochs = self.config.epochs.get();
        let norm = self.config.loss_normalization;
        let per_epoch = phase.trains() && self.config.reporting.per_epoch(cycle);

        if phase.trains() {
            let mut optimizer = GradientDescent::new(self.config.learning_rate);

            model::refit(&mut state, &mut optimizer, epochs, |epoch, loss| {
                let loss = norm.apply(loss, cycle, epochs);
                if per_epoch {
                    info!("Iteration {cycle}, epoch {epoch}: loss={loss}");
                } else {
                    trace!("Iteration {cycle}, epoch {epoch}: loss={loss}");
                }
            })?;
        }

        if !state.is_finite() {
            return Err(UpdateErr::Diverged { cycle });
        }

        self.store.persist(&state)?;
        self.last_cycle = Some(cycle);

        let loss = norm.apply(model::squared_error(&state), cycle, epochs);
        if self.config.reporting.reports(cycle) && !per_epoch {
            info!("Iteration {cycle}: loss={loss}");
        } else {
            trace!("Iteration {cycle}: loss={loss}");
        }

        Ok(UpdateReport {
            cycle,
            phase,
            state,
            loss,
            terminal: self.config.terminal_cycle == Some(cycle),
        })
    }

    fn check_order(&self, cycle: u64) {
        let Some(last) = self.last_cycle else {
            return;
        };

        if cycle != last + 1 {
            warn!("cycle {cycle} follows cycle {last}, expected {}", last + 1);
        }
    }
}

impl<F: FeatureSource> OnlineForecastUpdate<SharedMemoryStateStore, F> {
    /// Tears down the shared regions, ending the run.
    ///
    /// # Returns
    /// The feature source, so the host can start a new run from a cold state.
    ///
    /// # Errors
    /// `UpdateErr::Store` if an existing region can't be removed.
    pub fn destroy(self) -> Result<F> {
        let (store, source) = self.into_parts();
        store.destroy()?;
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FieldSnapshot;

    #[derive(Default)]
    struct MemoryStore {
        state: Option<State>,
        persists: usize,
    }

    impl StateStore for MemoryStore {
        fn load(&mut self) -> state_store::Result<State> {
            Ok(self.state.unwrap_or_default())
        }

        fn persist(&mut self, state: &State) -> state_store::Result<()> {
            self.state = Some(*state);
            self.persists += 1;
            Ok(())
        }
    }

    fn updater() -> OnlineForecastUpdate<MemoryStore, FieldSnapshot> {
        OnlineForecastUpdate::new(
            MemoryStore::default(),
            FieldSnapshot::default(),
            UpdateConfig::file_deployment(),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = UpdateConfig::default();
        config.learning_rate = f64::NAN;

        let res = OnlineForecastUpdate::new(MemoryStore::default(), FieldSnapshot::default(), config);
        assert!(matches!(res, Err(UpdateErr::Config(_))));
    }

    #[test]
    fn missing_feature_does_not_persist() {
        let mut updater = updater();

        let err = updater.update().unwrap_err();
        assert!(matches!(
            err,
            UpdateErr::InvalidFeature {
                cycle: 0,
                value: None
            }
        ));
        assert_eq!(updater.store().persists, 0);
    }

    #[test]
    fn infinite_feature_is_rejected() {
        let mut updater = updater();
        updater.source_mut().replace(0, vec![f64::INFINITY]);

        assert!(matches!(
            updater.update(),
            Err(UpdateErr::InvalidFeature { cycle: 0, .. })
        ));
        assert_eq!(updater.store().persists, 0);
    }

    #[test]
    fn warm_up_fills_window_without_training() {
        let mut updater = updater();

        for cycle in 0..5 {
            updater.source_mut().replace(cycle, vec![cycle as f64 * 3.0]);
            let report = updater.update().unwrap();

            assert_eq!(report.phase, Phase::WarmUp { position: cycle as usize });
            assert_eq!(report.state.window[cycle as usize], cycle as f64 * 3.0);
            assert_eq!(report.state.weights, State::default().weights);
        }
    }

    #[test]
    fn frozen_model_keeps_tracking() {
        let mut config = UpdateConfig::file_deployment();
        config.training_cutoff = Some(7);
        let mut updater =
            OnlineForecastUpdate::new(MemoryStore::default(), FieldSnapshot::default(), config)
                .unwrap();

        let mut weights = Vec::new();
        for cycle in 0..10 {
            updater.source_mut().replace(cycle, vec![cycle as f64]);
            weights.push(updater.update().unwrap().state.weights);
        }

        assert_ne!(weights[6], weights[5]);
        assert_eq!(weights[7], weights[6]);
        assert_eq!(weights[9], weights[6]);

        let state = updater.store().state.unwrap();
        assert_eq!(state.window, [1.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(state.target, 9.0);
    }

    #[test]
    fn terminal_cycle_is_flagged() {
        let mut config = UpdateConfig::file_deployment();
        config.terminal_cycle = Some(2);
        let mut updater =
            OnlineForecastUpdate::new(MemoryStore::default(), FieldSnapshot::default(), config)
                .unwrap();

        let mut flags = Vec::new();
        for cycle in 0..4 {
            updater.source_mut().replace(cycle, vec![1.0]);
            flags.push(updater.update().unwrap().terminal);
        }

        assert_eq!(flags, [false, false, true, false]);
    }

    #[test]
    fn loss_matches_state() {
        let mut updater = updater();

        for cycle in 0..8 {
            updater.source_mut().replace(cycle, vec![cycle as f64 + 1.0]);
            let report = updater.update().unwrap();

            let expected = model::squared_error(&report.state) / cycle.max(1) as f64;
            assert_eq!(report.loss, expected);
        }
    }
}
