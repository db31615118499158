pub mod estimate;
pub mod node;
pub mod payload;

pub use estimate::{EstimateReport, EstimatedLocation, NodeReport};
pub use node::SensorNode;
pub use payload::DetectionPayload;
