use crate::correlation::sink::EstimateSink;
use crate::correlation::window::{EventWindow, Tombstone};
use crate::geometry::{GeometrySolver, Point2};
use crate::prelude::{ConfigError, CorrelationError, SolverConfig};
use crate::telemetry::{Counter, LogManager, MetricsRecorder};
use crate::wire::{EstimateReport, SensorNode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What to do with a report whose event window has already closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateReportPolicy {
    /// Drop it as a `StaleReport`.
    #[default]
    Reject,
    /// Start a fresh window with it.
    OpenNew,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationConfig {
    /// Lifetime of an open window.
    pub timeout: Duration,
    /// Largest timestamp distance, in seconds, between reports of one event.
    /// Covers propagation across the array plus inter-node clock skew.
    pub max_skew: f64,
    /// How long closed windows are remembered.
    pub tombstone_retention: Duration,
    pub late_reports: LateReportPolicy,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_skew: 0.5,
            tombstone_retention: Duration::from_secs(60),
            late_reports: LateReportPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// The three sensors, in solver order (`A`, `B`, `C`).
    pub nodes: Vec<SensorNode>,
    pub speed_of_sound: f64,
    pub solver: SolverConfig,
    pub correlation: CorrelationConfig,
}

/// Result of a successfully routed report.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Opened { window: u64 },
    Accepted { window: u64, reported: usize },
    /// The report completed its window, which was solved and closed.
    Closed(EstimateReport),
}

impl RecordOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Opened { .. } => "opened",
            RecordOutcome::Accepted { .. } => "accepted",
            RecordOutcome::Closed(_) => "closed",
        }
    }
}

#[derive(Default)]
struct WindowState {
    open: Vec<EventWindow>,
    closed: VecDeque<Tombstone>,
    next_id: u64,
}

impl WindowState {
    fn next_window_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn nearest_open(&self, timestamp: f64, max_skew: f64) -> Option<usize> {
        self.open
            .iter()
            .enumerate()
            .map(|(idx, w)| (idx, (w.anchor - timestamp).abs()))
            .filter(|(_, distance)| *distance <= max_skew)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
    }

    fn nearest_closed(&self, timestamp: f64, max_skew: f64) -> Option<Tombstone> {
        self.closed
            .iter()
            .filter(|t| (t.anchor - timestamp).abs() <= max_skew)
            .min_by(|a, b| {
                (a.anchor - timestamp)
                    .abs()
                    .total_cmp(&(b.anchor - timestamp).abs())
            })
            .copied()
    }

    /// Discards timed-out windows and forgets old tombstones.
    fn expire(&mut self, now: Instant, config: &CorrelationConfig) -> Vec<EstimateReport> {
        let mut expired = Vec::new();
        let mut idx = 0;
        while idx < self.open.len() {
            if self.open[idx].is_expired(now, config.timeout) {
                let window = self.open.swap_remove(idx);
                self.closed.push_back(window.tombstone(now));
                expired.push(EstimateReport::Incomplete {
                    window: window.id,
                    reports: window.into_reports(),
                });
            } else {
                idx += 1;
            }
        }
        while let Some(oldest) = self.closed.front() {
            if now.saturating_duration_since(oldest.closed_at) > config.tombstone_retention {
                self.closed.pop_front();
            } else {
                break;
            }
        }
        expired.sort_by_key(EstimateReport::window);
        expired
    }
}

/// Collector-side correlation of per-node reports into solved events.
///
/// Every window lives behind one mutex, so the "three distinct nodes" check,
/// the solve that follows it and timeout discards never interleave.
pub struct DetectionAggregator<S: EstimateSink> {
    nodes: Vec<SensorNode>,
    speed_of_sound: f64,
    solver: GeometrySolver,
    correlation: CorrelationConfig,
    state: Mutex<WindowState>,
    sink: S,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: EstimateSink> DetectionAggregator<S> {
    pub fn new(config: AggregatorConfig, sink: S) -> Result<Self, ConfigError> {
        if config.nodes.len() != 3 {
            return Err(ConfigError::NodeCount(config.nodes.len()));
        }
        for (idx, node) in config.nodes.iter().enumerate() {
            if config.nodes[..idx].iter().any(|n| n.id == node.id) {
                return Err(ConfigError::DuplicateNodeId(node.id.clone()));
            }
        }
        if !(config.speed_of_sound.is_finite() && config.speed_of_sound > 0.0) {
            return Err(ConfigError::SpeedOfSound(config.speed_of_sound));
        }

        Ok(Self {
            nodes: config.nodes,
            speed_of_sound: config.speed_of_sound,
            solver: GeometrySolver::new(config.solver),
            correlation: config.correlation,
            state: Mutex::new(WindowState::default()),
            sink,
            metrics: Arc::new(MetricsRecorder::new()),
            logger: LogManager::new("aggregator"),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn nodes(&self) -> &[SensorNode] {
        &self.nodes
    }

    pub fn record_detection(
        &self,
        node_id: &str,
        timestamp: f64,
    ) -> Result<RecordOutcome, CorrelationError> {
        self.record_detection_at(node_id, timestamp, Instant::now())
    }

    /// Routes one report into its event window using `now` as the collector clock.
    pub fn record_detection_at(
        &self,
        node_id: &str,
        timestamp: f64,
        now: Instant,
    ) -> Result<RecordOutcome, CorrelationError> {
        if !self.nodes.iter().any(|n| n.id == node_id) {
            return Err(CorrelationError::UnknownNode(node_id.to_string()));
        }

        let (expired, outcome) = {
            let mut state = self.lock_state();
            let expired = state.expire(now, &self.correlation);
            let outcome = self.route(&mut state, node_id, timestamp, now);
            (expired, outcome)
        };

        self.publish_expired(expired);
        match &outcome {
            Ok(RecordOutcome::Closed(report)) => self.publish(report.clone()),
            Err(err @ CorrelationError::DuplicateNode { .. }) => {
                self.metrics.record(Counter::Duplicate);
                self.logger.warn(&err.to_string());
            }
            Err(err @ CorrelationError::StaleReport { .. }) => {
                self.metrics.record(Counter::Stale);
                self.logger.warn(&err.to_string());
            }
            _ => {}
        }
        outcome
    }

    /// Discards every window that has outlived the correlation timeout.
    pub fn expire(&self, now: Instant) -> Vec<EstimateReport> {
        let expired = self.lock_state().expire(now, &self.correlation);
        self.publish_expired(expired.clone());
        expired
    }

    pub fn open_windows(&self) -> usize {
        self.lock_state().open.len()
    }

    fn route(
        &self,
        state: &mut WindowState,
        node_id: &str,
        timestamp: f64,
        now: Instant,
    ) -> Result<RecordOutcome, CorrelationError> {
        let max_skew = self.correlation.max_skew;

        if let Some(idx) = state.nearest_open(timestamp, max_skew) {
            let window = &mut state.open[idx];
            if window.contains(node_id) {
                return Err(CorrelationError::DuplicateNode {
                    node_id: node_id.to_string(),
                    window: window.id,
                });
            }
            let reported = window.insert(node_id, timestamp);
            if !window.is_complete() {
                return Ok(RecordOutcome::Accepted {
                    window: window.id,
                    reported,
                });
            }
            let window = state.open.swap_remove(idx);
            state.closed.push_back(window.tombstone(now));
            return Ok(RecordOutcome::Closed(self.solve_window(window)));
        }

        if let Some(tombstone) = state.nearest_closed(timestamp, max_skew) {
            if self.correlation.late_reports == LateReportPolicy::Reject {
                return Err(CorrelationError::StaleReport {
                    node_id: node_id.to_string(),
                    window: tombstone.id,
                });
            }
        }

        let id = state.next_window_id();
        state
            .open
            .push(EventWindow::open(id, node_id, timestamp, now));
        self.logger
            .record(&format!("window {} opened by {} at {:.6}", id, node_id, timestamp));
        Ok(RecordOutcome::Opened { window: id })
    }

    fn solve_window(&self, window: EventWindow) -> EstimateReport {
        let mut positions = [Point2::default(); 3];
        let mut timestamps = [0.0; 3];
        for (slot, node) in self.nodes.iter().enumerate() {
            positions[slot] = node.position;
            // Registry membership was checked before the report was inserted.
            timestamps[slot] = window.timestamp_of(&node.id).unwrap_or(f64::NAN);
        }

        let id = window.id;
        match self.solver.solve(positions, timestamps, self.speed_of_sound) {
            Ok(location) => EstimateReport::Located {
                window: id,
                location,
                reports: window.into_reports(),
            },
            Err(error) => EstimateReport::Failed {
                window: id,
                error,
                reports: window.into_reports(),
            },
        }
    }

    fn publish_expired(&self, expired: Vec<EstimateReport>) {
        for report in expired {
            self.publish(report);
        }
    }

    fn publish(&self, report: EstimateReport) {
        match &report {
            EstimateReport::Located { .. } => {
                self.metrics.record(Counter::Solved);
                self.logger.record(&report.summary());
            }
            EstimateReport::Failed { .. } => {
                self.metrics.record(Counter::SolveFailed);
                self.logger.warn(&report.summary());
            }
            EstimateReport::Incomplete { .. } => {
                self.metrics.record(Counter::Incomplete);
                self.logger.warn(&report.summary());
            }
        }
        self.sink.emit(report);
    }

    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
