mod region;

use std::mem::size_of;

use log::info;

pub use region::SharedRegion;

use crate::{Result, State, StateStore, StoreErr, WINDOW_LEN};

/// Default name of the region holding the feature window.
pub const WINDOW_REGION: &str = "/insitu_forecast_window";
/// Default name of the region holding the training target.
pub const TARGET_REGION: &str = "/insitu_forecast_target";
/// Default name of the region holding the model weights.
pub const WEIGHTS_REGION: &str = "/insitu_forecast_weights";

/// Initial model weight used when the shared memory deployment creates its regions.
pub const SHM_INITIAL_WEIGHT: f64 = 0.05;

/// The well-known names of the three regions backing a `SharedMemoryStateStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNames {
    pub window: String,
    pub target: String,
    pub weights: String,
}

impl RegionNames {
    /// Derives the three region names from a common prefix.
    ///
    /// # Arguments
    /// * `prefix` - A name starting with `/`, e.g. `/my_run`.
    ///
    /// # Returns
    /// Names of the form `{prefix}_window`, `{prefix}_target` and `{prefix}_weights`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            window: format!("{prefix}_window"),
            target: format!("{prefix}_target"),
            weights: format!("{prefix}_weights"),
        }
    }
}

impl Default for RegionNames {
    fn default() -> Self {
        Self {
            window: WINDOW_REGION.to_string(),
            target: TARGET_REGION.to_string(),
            weights: WEIGHTS_REGION.to_string(),
        }
    }
}

/// Keeps the state in three cross-process shared memory regions.
///
/// The first process to open the regions initializes them with the default state, later
/// openers attach and observe whatever was last persisted. There is no locking, callers
/// must make sure a single process writes at a time.
///
/// Dropping the store only detaches from the regions. The owner is expected to call
/// `destroy` once the run reaches its terminal condition.
#[derive(Debug)]
pub struct SharedMemoryStateStore {
    window: SharedRegion,
    target: SharedRegion,
    weights: SharedRegion,
}

impl SharedMemoryStateStore {
    /// Opens the store with the default region names and initial weight.
    ///
    /// # Errors
    /// A `StoreErr` if any region can't be created or attached.
    pub fn open_default() -> Result<Self> {
        Self::open(&RegionNames::default(), State::with_initial_weight(SHM_INITIAL_WEIGHT))
    }

    /// Creates or attaches to the three regions.
    ///
    /// # Arguments
    /// * `names` - The region names.
    /// * `defaults` - The state written to regions created by this call.
    ///
    /// # Returns
    /// A new `SharedMemoryStateStore` instance.
    ///
    /// # Errors
    /// A `StoreErr` if any region can't be created or attached. Regions created by this
    /// call are removed again before returning the error.
    pub fn open(names: &RegionNames, defaults: State) -> Result<Self> {
        let mut window = SharedRegion::open(&names.window, WINDOW_LEN)?;

        let mut target = match SharedRegion::open(&names.target, 1) {
            Ok(region) => region,
            Err(e) => {
                discard(window);
                return Err(e);
            }
        };

        let mut weights = match SharedRegion::open(&names.weights, WINDOW_LEN) {
            Ok(region) => region,
            Err(e) => {
                discard(window);
                discard(target);
                return Err(e);
            }
        };

        if window.created() {
            window.write(&defaults.window)?;
        }
        if target.created() {
            target.write(&[defaults.target])?;
        }
        if weights.created() {
            weights.write(&defaults.weights)?;
        }

        let created = window.created() || target.created() || weights.created();
        info!(
            "{} shared state regions {}, {}, {}",
            if created { "created" } else { "attached to" },
            names.window,
            names.target,
            names.weights,
        );

        Ok(Self {
            window,
            target,
            weights,
        })
    }

    /// Builds the store from regions the caller already opened.
    ///
    /// No initialization happens, the regions keep whatever they hold.
    ///
    /// # Errors
    /// `StoreErr::RegionSize` if a region can't hold its part of the state. The regions are
    /// released in that case.
    pub fn from_regions(
        window: SharedRegion,
        target: SharedRegion,
        weights: SharedRegion,
    ) -> Result<Self> {
        for (region, expected) in [(&window, WINDOW_LEN), (&target, 1), (&weights, WINDOW_LEN)] {
            if region.len() != expected {
                return Err(StoreErr::RegionSize {
                    region: region.name().to_string(),
                    got: region.len() * size_of::<f64>(),
                    expected: expected * size_of::<f64>(),
                });
            }
        }

        Ok(Self {
            window,
            target,
            weights,
        })
    }

    /// Returns `true` if this process created at least one of the regions.
    pub fn created(&self) -> bool {
        self.window.created() || self.target.created() || self.weights.created()
    }

    /// Returns the raw bytes of the three regions: window, target and weights.
    pub fn snapshot(&self) -> Vec<u8> {
        [&self.window, &self.target, &self.weights]
            .iter()
            .flat_map(|region| region.as_bytes().iter().copied())
            .collect()
    }

    /// Detaches from the regions without removing them.
    pub fn release(self) {
        info!("detaching from shared state regions");
        drop(self);
    }

    /// Detaches from the regions and removes them.
    ///
    /// Removing a region that is already gone is logged and otherwise ignored.
    ///
    /// # Errors
    /// A `StoreErr` if an existing region can't be removed. Every region is still attempted.
    pub fn destroy(self) -> Result<()> {
        let Self {
            window,
            target,
            weights,
        } = self;

        info!("destroying shared state regions");
        let results = [window.destroy(), target.destroy(), weights.destroy()];
        results.into_iter().try_for_each(|res| res.map(drop))
    }

    /// Removes the named regions without attaching to them.
    ///
    /// # Errors
    /// A `StoreErr` if an existing region can't be removed. Every region is still attempted.
    pub fn remove(names: &RegionNames) -> Result<()> {
        let results = [
            SharedRegion::unlink(&names.window),
            SharedRegion::unlink(&names.target),
            SharedRegion::unlink(&names.weights),
        ];
        results.into_iter().try_for_each(|res| res.map(drop))
    }
}

impl StateStore for SharedMemoryStateStore {
    fn load(&mut self) -> Result<State> {
        let mut state = State::default();
        let mut target = [0.0];

        self.window.read(&mut state.window)?;
        self.target.read(&mut target)?;
        self.weights.read(&mut state.weights)?;
        state.target = target[0];

        Ok(state)
    }

    fn persist(&mut self, state: &State) -> Result<()> {
        self.window.write(&state.window)?;
        self.target.write(&[state.target])?;
        self.weights.write(&state.weights)
    }
}

fn discard(region: SharedRegion) {
    if region.created() {
        let _ = region.destroy();
    }
}
