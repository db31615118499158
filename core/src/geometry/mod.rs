pub mod point;
pub mod solver;

pub use point::Point2;
pub use solver::{solve, synthesize_timestamps, GeometrySolver};
