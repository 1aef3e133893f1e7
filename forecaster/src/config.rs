use std::{error::Error, fmt, fs, io, num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};

const DEFAULT_EPOCHS: NonZeroUsize = NonZeroUsize::new(100).unwrap();
const DEFAULT_LEARNING_RATE: f64 = 1e-7;

/// How the reported loss is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossNormalization {
    /// The raw squared error.
    None,
    /// Divided by the cycle index (by 1 at cycle 0).
    #[default]
    Cycle,
    /// Divided by the amount of refit epochs.
    Epochs,
}

impl LossNormalization {
    /// Scales a squared error according to this normalization.
    pub fn apply(self, loss: f64, cycle: u64, epochs: usize) -> f64 {
        match self {
            Self::None => loss,
            Self::Cycle => loss / cycle.max(1) as f64,
            Self::Epochs => loss / epochs as f64,
        }
    }
}

/// When the loss gets logged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reporting {
    /// One loss line per cycle.
    #[default]
    EveryCycle,
    /// Only at the listed cycles, optionally one line per refit epoch.
    Milestones {
        cycles: Vec<u64>,
        #[serde(default)]
        per_epoch: bool,
    },
}

impl Reporting {
    /// Returns `true` if the loss of `cycle` gets logged.
    pub fn reports(&self, cycle: u64) -> bool {
        match self {
            Self::EveryCycle => true,
            Self::Milestones { cycles, .. } => cycles.contains(&cycle),
        }
    }

    /// Returns `true` if every refit epoch of `cycle` gets logged.
    pub fn per_epoch(&self, cycle: u64) -> bool {
        match self {
            Self::EveryCycle => false,
            Self::Milestones { cycles, per_epoch } => *per_epoch && cycles.contains(&cycle),
        }
    }
}

/// Tunables of the online update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateConfig {
    /// Gradient descent steps per refit.
    pub epochs: NonZeroUsize,
    /// Fixed step size of the gradient descent.
    pub learning_rate: f64,
    /// Refitting stops at this cycle, the window keeps tracking features.
    pub training_cutoff: Option<u64>,
    pub loss_normalization: LossNormalization,
    pub reporting: Reporting,
    /// The cycle at which the run ends and shared resources get torn down.
    pub terminal_cycle: Option<u64>,
}

impl UpdateConfig {
    /// The stable storage deployment: unbounded training, loss normalized by cycle and
    /// reported every cycle.
    pub fn file_deployment() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            training_cutoff: None,
            loss_normalization: LossNormalization::Cycle,
            reporting: Reporting::EveryCycle,
            terminal_cycle: None,
        }
    }

    /// The shared memory deployment: training until cycle 400, per-epoch losses normalized
    /// by the epoch count at every hundredth cycle and teardown at cycle 900.
    pub fn shared_memory_deployment() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            training_cutoff: Some(400),
            loss_normalization: LossNormalization::Epochs,
            reporting: Reporting::Milestones {
                cycles: vec![100, 200, 300, 400],
                per_epoch: true,
            },
            terminal_cycle: Some(900),
        }
    }

    /// Loads a configuration from a JSON file, missing fields take their default value.
    ///
    /// # Errors
    /// A `ConfigErr` if the file can't be read, parsed or holds invalid values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigErr> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants serde can't express.
    ///
    /// # Errors
    /// `ConfigErr::Invalid` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigErr::Invalid("learning_rate must be finite and positive"));
        }

        if self.training_cutoff == Some(0) {
            return Err(ConfigErr::Invalid("training_cutoff must be positive"));
        }

        Ok(())
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::file_deployment()
    }
}

/// Failures while loading an `UpdateConfig`.
#[derive(Debug)]
pub enum ConfigErr {
    Io(io::Error),
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "invalid JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for ConfigErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
