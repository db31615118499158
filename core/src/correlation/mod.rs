pub mod aggregator;
pub mod sink;
mod window;

pub use aggregator::{
    AggregatorConfig, CorrelationConfig, DetectionAggregator, LateReportPolicy, RecordOutcome,
};
pub use sink::{EstimateSink, MemorySink};
pub use window::REQUIRED_NODES;
