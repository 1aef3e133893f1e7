use std::{error::Error, fmt, io, path::PathBuf};

/// The state store module's result type.
pub type Result<T> = std::result::Result<T, StoreErr>;

/// Failures while recovering or persisting the forecaster state.
///
/// A missing state is never an error, stores fall back to the default state instead.
#[derive(Debug)]
pub enum StoreErr {
    /// Reading or writing the backing storage failed.
    Io(io::Error),
    /// Persisted data exists but doesn't decode to a valid state.
    Corrupt { path: PathBuf, reason: String },
    /// A shared memory region could not be created or attached.
    Unavailable { region: String, source: io::Error },
    /// An existing shared memory region has an incompatible size.
    RegionSize {
        region: String,
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErr::Io(e) => write!(f, "io error: {e}"),
            StoreErr::Corrupt { path, reason } => {
                write!(f, "corrupt state at {}: {reason}", path.display())
            }
            StoreErr::Unavailable { region, source } => {
                write!(f, "shared region {region} unavailable: {source}")
            }
            StoreErr::RegionSize {
                region,
                got,
                expected,
            } => write!(
                f,
                "shared region {region} has {got} bytes, expected {expected}"
            ),
        }
    }
}

impl Error for StoreErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreErr::Io(e) => Some(e),
            StoreErr::Unavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
