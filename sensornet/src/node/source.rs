use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies detection timestamps to the node's periodic task.
pub trait DetectionSource: Send + Sync + 'static {
    /// Timestamp of a detection since the last poll, if there was one.
    fn poll(&self) -> Option<f64>;
}

/// Reports the wall clock on every tick, in seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSource;

impl DetectionSource for ClockSource {
    fn poll(&self) -> Option<f64> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Some(elapsed.as_secs_f64())
    }
}
