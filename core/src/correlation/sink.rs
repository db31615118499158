use crate::wire::EstimateReport;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Destination for per-event results produced by the aggregator.
pub trait EstimateSink: Send + Sync {
    fn emit(&self, report: EstimateReport);
}

impl EstimateSink for UnboundedSender<EstimateReport> {
    fn emit(&self, report: EstimateReport) {
        if let Err(err) = self.send(report) {
            log::warn!("estimate sink closed, dropping window {}", err.0.window());
        }
    }
}

/// Sink that keeps every report in memory.
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<Vec<EstimateReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<EstimateReport> {
        self.reports
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl EstimateSink for MemorySink {
    fn emit(&self, report: EstimateReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

impl<S: EstimateSink + ?Sized> EstimateSink for std::sync::Arc<S> {
    fn emit(&self, report: EstimateReport) {
        (**self).emit(report)
    }
}
