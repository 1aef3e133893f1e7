mod error;
mod file;
mod shm;
mod state;
mod store;

pub use error::{Result, StoreErr};
pub use file::FileStateStore;
pub use shm::{
    RegionNames, SHM_INITIAL_WEIGHT, SharedMemoryStateStore, SharedRegion, TARGET_REGION,
    WEIGHTS_REGION, WINDOW_REGION,
};
pub use state::{DEFAULT_INITIAL_WEIGHT, State, WINDOW_LEN, WINDOW_SENTINEL};
pub use store::StateStore;
