use crate::generator::scenario::{build_events, ScenarioConfig};
use crate::workflow::config::CollectorConfig;
use anyhow::{ensure, Context};
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tdoacore::correlation::{MemorySink, RecordOutcome};
use tdoacore::{DetectionAggregator, EstimateReport, Point2};

/// One synthesized event next to what the collector made of it.
#[derive(Debug, Clone)]
pub struct SimulatedEstimate {
    pub index: usize,
    pub truth: Point2,
    pub report: EstimateReport,
}

impl SimulatedEstimate {
    /// Distance between estimate and ground truth, when the solve succeeded.
    pub fn error_m(&self) -> Option<f64> {
        self.report
            .location()
            .map(|location| location.position.distance_to(&self.truth))
    }
}

pub struct SimulationResult {
    /// One entry per window the aggregator reported, in event order.
    pub estimates: Vec<SimulatedEstimate>,
    pub rejected_reports: usize,
}

impl SimulationResult {
    pub fn located(&self) -> usize {
        self.estimates
            .iter()
            .filter(|e| e.report.location().is_some())
            .count()
    }

    /// Windows that never gathered three reports, e.g. events split by jitter.
    pub fn incomplete(&self) -> usize {
        self.estimates
            .iter()
            .filter(|e| matches!(e.report, EstimateReport::Incomplete { .. }))
            .count()
    }

    /// Indices of events that produced no report at all.
    pub fn unreported_events(&self, events: usize) -> Vec<usize> {
        (0..events)
            .filter(|index| !self.estimates.iter().any(|e| e.index == *index))
            .collect()
    }
}

/// Offline driver: pushes synthetic detections through a local aggregator.
#[derive(Clone)]
pub struct Runner {
    config: CollectorConfig,
}

impl Runner {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, scenario: &ScenarioConfig) -> anyhow::Result<SimulationResult> {
        ensure!(
            scenario.spacing > 2.0 * self.config.correlation.max_skew_s,
            "event spacing must exceed twice the correlation skew"
        );

        let sink = Arc::new(MemorySink::new());
        let aggregator_config = self.config.to_aggregator_config();
        let timeout = aggregator_config.correlation.timeout;
        let aggregator = DetectionAggregator::new(aggregator_config, sink.clone())
            .context("building detection aggregator")?;
        let events = build_events(&self.config.nodes, scenario)?;

        let now = Instant::now();
        let mut rejected_reports = 0;
        // Window id -> index of the event whose report opened it.
        let mut owners: HashMap<u64, usize> = HashMap::new();
        for event in &events {
            for detection in &event.detections {
                match aggregator.record_detection_at(&detection.node_id, detection.timestamp, now)
                {
                    Ok(outcome) => {
                        owners.entry(outcome_window(&outcome)).or_insert(event.index);
                    }
                    Err(err) => {
                        warn!("simulated event {}: {}", event.index, err);
                        rejected_reports += 1;
                    }
                }
            }
        }

        // Whatever is still open will never complete; report it as incomplete.
        aggregator.expire(now + timeout);

        let mut estimates = Vec::new();
        for report in sink.reports() {
            let Some(&index) = owners.get(&report.window()) else {
                warn!("window {} has no originating event", report.window());
                continue;
            };
            estimates.push(SimulatedEstimate {
                index,
                truth: events[index].source,
                report,
            });
        }
        estimates.sort_by_key(|e| (e.index, e.report.window()));

        Ok(SimulationResult {
            estimates,
            rejected_reports,
        })
    }
}

fn outcome_window(outcome: &RecordOutcome) -> u64 {
    match outcome {
        RecordOutcome::Opened { window } | RecordOutcome::Accepted { window, .. } => *window,
        RecordOutcome::Closed(report) => report.window(),
    }
}
