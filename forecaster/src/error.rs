use std::{error::Error, fmt};

use state_store::StoreErr;

use crate::{config::ConfigErr, optimization::SizeMismatchErr};

/// The forecaster module's result type.
pub type Result<T> = std::result::Result<T, UpdateErr>;

/// Failures of a single update call.
///
/// Whatever the variant, the previously persisted state is left untouched.
#[derive(Debug)]
pub enum UpdateErr {
    /// The feature source produced a missing or non-finite feature.
    InvalidFeature { cycle: u64, value: Option<f64> },
    /// The refit produced non-finite weights.
    Diverged { cycle: u64 },
    /// The state couldn't be loaded or persisted.
    Store(StoreErr),
    Optimizer(SizeMismatchErr),
    Config(ConfigErr),
}

impl fmt::Display for UpdateErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateErr::InvalidFeature {
                cycle,
                value: Some(value),
            } => write!(f, "invalid feature at cycle {cycle}: {value}"),
            UpdateErr::InvalidFeature { cycle, value: None } => {
                write!(f, "missing feature at cycle {cycle}")
            }
            UpdateErr::Diverged { cycle } => {
                write!(f, "refit diverged at cycle {cycle}")
            }
            UpdateErr::Store(e) => write!(f, "state store error: {e}"),
            UpdateErr::Optimizer(e) => write!(f, "{e}"),
            UpdateErr::Config(e) => write!(f, "{e}"),
        }
    }
}

impl Error for UpdateErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UpdateErr::Store(e) => Some(e),
            UpdateErr::Optimizer(e) => Some(e),
            UpdateErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreErr> for UpdateErr {
    fn from(value: StoreErr) -> Self {
        Self::Store(value)
    }
}

impl From<SizeMismatchErr> for UpdateErr {
    fn from(value: SizeMismatchErr) -> Self {
        Self::Optimizer(value)
    }
}

impl From<ConfigErr> for UpdateErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}
