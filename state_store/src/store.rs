use crate::{Result, State};

/// Where the forecaster state lives between two update calls.
///
/// Implementations must be observable across processes: a `load` issued by a different
/// process after a `persist` returns the persisted state.
pub trait StateStore {
    /// Recovers the persisted state.
    ///
    /// # Returns
    /// The persisted state, or the store's default state if nothing was persisted yet.
    ///
    /// # Errors
    /// A `StoreErr` if persisted data exists but can't be read back.
    fn load(&mut self) -> Result<State>;

    /// Replaces the persisted state.
    ///
    /// # Arguments
    /// * `state` - The state to persist.
    ///
    /// # Errors
    /// A `StoreErr` if the backing storage can't be written.
    fn persist(&mut self, state: &State) -> Result<()>;
}

impl<S: StateStore + ?Sized> StateStore for &mut S {
    fn load(&mut self) -> Result<State> {
        (**self).load()
    }

    fn persist(&mut self, state: &State) -> Result<()> {
        (**self).persist(state)
    }
}
