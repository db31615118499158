use crate::geometry::Point2;
use crate::prelude::SolveError;
use serde::Serialize;

/// Solver output for one closed event window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedLocation {
    pub position: Point2,
    pub bearing_degrees: f64,
    /// Norm of the range-difference residual at the solution, in metres.
    pub residual: f64,
    pub iterations: usize,
}

/// A single `(node_id, timestamp)` pair held by a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub node_id: String,
    pub timestamp: f64,
}

/// Everything the aggregator hands to the estimate sink.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateReport {
    Located {
        window: u64,
        location: EstimatedLocation,
        reports: Vec<NodeReport>,
    },
    Failed {
        window: u64,
        error: SolveError,
        reports: Vec<NodeReport>,
    },
    /// Window timed out before three distinct nodes reported.
    Incomplete { window: u64, reports: Vec<NodeReport> },
}

impl EstimateReport {
    pub fn window(&self) -> u64 {
        match self {
            EstimateReport::Located { window, .. }
            | EstimateReport::Failed { window, .. }
            | EstimateReport::Incomplete { window, .. } => *window,
        }
    }

    pub fn reports(&self) -> &[NodeReport] {
        match self {
            EstimateReport::Located { reports, .. }
            | EstimateReport::Failed { reports, .. }
            | EstimateReport::Incomplete { reports, .. } => reports,
        }
    }

    pub fn location(&self) -> Option<&EstimatedLocation> {
        match self {
            EstimateReport::Located { location, .. } => Some(location),
            _ => None,
        }
    }

    /// One-line summary used by the collector log and report file.
    pub fn summary(&self) -> String {
        let nodes = self
            .reports()
            .iter()
            .map(|r| format!("{}@{:.6}", r.node_id, r.timestamp))
            .collect::<Vec<_>>()
            .join(",");
        match self {
            EstimateReport::Located {
                window, location, ..
            } => format!(
                "window={} located x={:.3} y={:.3} bearing={:.2} residual={:.2e} nodes=[{}]",
                window,
                location.position.x,
                location.position.y,
                location.bearing_degrees,
                location.residual,
                nodes
            ),
            EstimateReport::Failed { window, error, .. } => {
                format!("window={} failed reason=\"{}\" nodes=[{}]", window, error, nodes)
            }
            EstimateReport::Incomplete { window, .. } => {
                format!("window={} incomplete nodes=[{}]", window, nodes)
            }
        }
    }
}
