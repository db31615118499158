use serde::{Deserialize, Serialize};

pub use crate::geometry::Point2;

/// Speed of sound in dry air at roughly 20 °C, metres per second.
pub const SPEED_OF_SOUND_AIR: f64 = 343.0;

/// Convergence settings shared by every solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Residual norm, in metres, below which a solution is accepted.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

/// Failure modes of the geometry solver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("degenerate geometry: sensor positions are collinear")]
    DegenerateGeometry,
    #[error("no convergence after {iterations} iterations (residual {residual:.6} m)")]
    NoConvergence { iterations: usize, residual: f64 },
}

pub type SolveResult<T> = Result<T, SolveError>;

/// Conditions raised while correlating reports into event windows.
///
/// None of these are fatal; the offending report is dropped and the
/// aggregator state is left untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("node {node_id} already reported in window {window}")]
    DuplicateNode { node_id: String, window: u64 },
    #[error("report from {node_id} belongs to closed window {window}")]
    StaleReport { node_id: String, window: u64 },
    #[error("node {0} is not part of the sensor registry")]
    UnknownNode(String),
}

/// Registry validation failures raised while building an aggregator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("expected exactly 3 sensor nodes, got {0}")]
    NodeCount(usize),
    #[error("sensor node id {0} is listed twice")]
    DuplicateNodeId(String),
    #[error("speed of sound must be positive, got {0}")]
    SpeedOfSound(f64),
}
