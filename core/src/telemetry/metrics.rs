use serde::Serialize;
use std::sync::Mutex;

/// Events counted across the delivery path and the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    DeliveredDirect,
    DeliveredRelayed,
    DeliveryFailed,
    RelayForwarded,
    RelayRejected,
    RelayFailed,
    Solved,
    SolveFailed,
    Incomplete,
    Duplicate,
    Stale,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub delivered_direct: usize,
    pub delivered_relayed: usize,
    pub delivery_failed: usize,
    pub relay_forwarded: usize,
    pub relay_rejected: usize,
    pub relay_failed: usize,
    pub solved: usize,
    pub solve_failed: usize,
    pub incomplete: usize,
    pub duplicate: usize,
    pub stale: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record(&self, counter: Counter) {
        if let Ok(mut metrics) = self.inner.lock() {
            let slot = match counter {
                Counter::DeliveredDirect => &mut metrics.delivered_direct,
                Counter::DeliveredRelayed => &mut metrics.delivered_relayed,
                Counter::DeliveryFailed => &mut metrics.delivery_failed,
                Counter::RelayForwarded => &mut metrics.relay_forwarded,
                Counter::RelayRejected => &mut metrics.relay_rejected,
                Counter::RelayFailed => &mut metrics.relay_failed,
                Counter::Solved => &mut metrics.solved,
                Counter::SolveFailed => &mut metrics.solve_failed,
                Counter::Incomplete => &mut metrics.incomplete,
                Counter::Duplicate => &mut metrics.duplicate,
                Counter::Stale => &mut metrics.stale,
            };
            *slot += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
