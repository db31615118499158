//! Core of the acoustic TDOA sensor network.
//!
//! Three fixed sensors timestamp an impulsive event; the collector groups
//! those timestamps into event windows and turns each complete window into a
//! position and bearing estimate.

pub mod correlation;
pub mod geometry;
pub mod prelude;
pub mod telemetry;
pub mod wire;

pub use correlation::{DetectionAggregator, EstimateSink};
pub use geometry::GeometrySolver;
pub use prelude::{CorrelationError, Point2, SolveError, SolverConfig};
pub use wire::{DetectionPayload, EstimateReport, EstimatedLocation, SensorNode};
