use std::{
    error::Error,
    fmt::{self, Display},
};

/// The specific result type for size mismatch checks inside the optimization module.
pub type Result<T> = std::result::Result<T, SizeMismatchErr>;

/// Error returned by an `Optimizer` whenever the gradient and the weights don't have the
/// same length.
#[derive(Debug)]
pub struct SizeMismatchErr;

impl Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Optimizer error: the gradient length doesn't match the amount of weights")
    }
}

impl Error for SizeMismatchErr {}
