mod config;
mod error;
pub mod model;
pub mod optimization;
mod phase;
mod source;
mod update;

pub use config::{ConfigErr, LossNormalization, Reporting, UpdateConfig};
pub use error::{Result, UpdateErr};
pub use phase::{Phase, TARGET_CYCLE, slide};
pub use source::{FeatureSource, FieldSnapshot};
pub use update::{OnlineForecastUpdate, UpdateReport};
