pub mod service;
pub mod source;

pub use service::{run_node, start_node, NodeHandle};
pub use source::{ClockSource, DetectionSource};
