use serde::{Deserialize, Serialize};
use tdoacore::telemetry::MetricsSnapshot;

/// Body of `GET /status` on the collector.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectorStatus {
    pub open_windows: usize,
    pub solved: usize,
    pub solve_failed: usize,
    pub incomplete: usize,
    pub duplicate: usize,
    pub stale: usize,
}

impl CollectorStatus {
    pub fn new(open_windows: usize, metrics: &MetricsSnapshot) -> Self {
        Self {
            open_windows,
            solved: metrics.solved,
            solve_failed: metrics.solve_failed,
            incomplete: metrics.incomplete,
            duplicate: metrics.duplicate,
            stale: metrics.stale,
        }
    }
}
