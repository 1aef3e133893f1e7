use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{Result, State, StateStore, StoreErr};

/// Keeps the state as a serialized record on stable storage.
///
/// Every `persist` fully overwrites the record. The new record is written to a sibling
/// temporary file first and then renamed over the old one, so an interrupted write leaves
/// the previous record in place.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    defaults: State,
}

impl FileStateStore {
    /// Creates a new `FileStateStore`.
    ///
    /// # Arguments
    /// * `path` - Where the state record lives.
    ///
    /// # Returns
    /// A store that falls back to `State::default()` when `path` doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(path, State::default())
    }

    /// Creates a new `FileStateStore` with a custom default state.
    ///
    /// # Arguments
    /// * `path` - Where the state record lives.
    /// * `defaults` - The state returned by `load` while nothing has been persisted.
    ///
    /// # Returns
    /// A new `FileStateStore` instance.
    pub fn with_defaults(path: impl Into<PathBuf>, defaults: State) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    /// Returns the path of the state record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl ToString) -> StoreErr {
        StoreErr::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&mut self) -> Result<State> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no state at {}, using defaults", self.path.display());
                return Ok(self.defaults);
            }
            Err(e) => return Err(e.into()),
        };

        let state: State = serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;

        if !state.is_finite() {
            return Err(self.corrupt("non-finite value in record"));
        }

        debug!("loaded state from {}", self.path.display());
        Ok(state)
    }

    fn persist(&mut self, state: &State) -> Result<()> {
        if !state.is_finite() {
            return Err(StoreErr::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to persist a non-finite state",
            )));
        }

        let bytes = serde_json::to_vec(state).map_err(io::Error::other)?;
        let staging = self.staging_path();

        let mut file = File::create(&staging)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&staging, &self.path)?;

        debug!("persisted state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, FileStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (_dir, mut store) = scratch();

        assert_eq!(store.load().unwrap(), State::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn custom_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = State::with_initial_weight(0.05);
        let mut store = FileStateStore::with_defaults(dir.path().join("state.json"), defaults);

        assert_eq!(store.load().unwrap(), defaults);
    }

    #[test]
    fn persist_then_load() {
        let (_dir, mut store) = scratch();
        let state = State {
            window: [1.0, 6.0, 8.0, 10.0, 12.0],
            target: 14.0,
            weights: [0.1, 0.2, 0.3, 0.4, 0.5],
        };

        store.persist(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn persist_overwrites_previous_record() {
        let (_dir, mut store) = scratch();
        let mut state = State::default();

        store.persist(&state).unwrap();
        state.target = 42.0;
        store.persist(&state).unwrap();

        assert_eq!(store.load().unwrap().target, 42.0);
        assert!(!store.staging_path().exists());
    }

    #[test]
    fn new_store_sees_persisted_state() {
        let (_dir, mut store) = scratch();
        let mut state = State::default();
        state.window[2] = 3.5;
        store.persist(&state).unwrap();

        let mut other = FileStateStore::new(store.path());
        assert_eq!(other.load().unwrap(), state);
    }

    #[test]
    fn garbage_is_corrupt() {
        let (_dir, mut store) = scratch();
        fs::write(store.path(), b"not a state").unwrap();

        assert!(matches!(store.load(), Err(StoreErr::Corrupt { .. })));
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let (_dir, mut store) = scratch();
        let record = r#"{"window":[1,2,3],"target":0,"weights":[0.1,0.1,0.1,0.1,0.1]}"#;
        fs::write(store.path(), record).unwrap();

        assert!(matches!(store.load(), Err(StoreErr::Corrupt { .. })));
    }

    #[test]
    fn non_finite_state_is_not_persisted() {
        let (_dir, mut store) = scratch();
        let good = State::default();
        store.persist(&good).unwrap();

        let mut bad = good;
        bad.weights[0] = f64::NAN;
        assert!(store.persist(&bad).is_err());
        assert_eq!(store.load().unwrap(), good);
    }
}
