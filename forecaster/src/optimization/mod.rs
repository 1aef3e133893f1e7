mod error;
mod gradient_descent;
mod optimizer;

pub use error::{Result, SizeMismatchErr};
pub use gradient_descent::GradientDescent;
pub use optimizer::Optimizer;
