//! Transform library.
//!
//! One pure function per supported step. Every function takes a table and
//! the step's own parameters and returns a new table; statistics are fitted
//! on the input table alone, nothing is carried between calls.

mod power;
mod scaling;
mod smoothing;

pub use power::{box_cox, yeo_johnson, LAMBDA_BOUND};
pub use scaling::{normalize, standardize};
pub use smoothing::{difference, moving_average};
