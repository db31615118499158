pub mod endpoint;
pub mod model;
pub mod service;

pub use endpoint::collector_routes;
pub use model::CollectorStatus;
pub use service::{run_collector, start_collector, CollectorAggregator, CollectorHandle};
