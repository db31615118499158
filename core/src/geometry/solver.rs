use crate::geometry::point::Point2;
use crate::prelude::{SolveError, SolveResult, SolverConfig};
use crate::wire::EstimatedLocation;
use log::debug;

/// Area below this fraction of the squared baseline counts as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;
const MIN_DISTANCE: f64 = 1e-12;
const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e12;

/// Hyperbolic TDOA solver for a three-sensor array.
///
/// The timestamps are turned into two range differences relative to the first
/// sensor `A`:
///
/// ```text
/// ‖S−A‖ − ‖S−B‖ = c·(t_B − t_A)
/// ‖S−A‖ − ‖S−C‖ = c·(t_C − t_A)
/// ```
///
/// and the system is solved with a Levenberg–Marquardt damped Gauss–Newton
/// iteration started from the centroid of the array.
///
/// Two hyperbolae can cross twice, so three sensors do not always pin down a
/// unique source. Both crossings satisfy the equations within tolerance; the
/// solver returns whichever one the centroid seed descends into, which for
/// sources far outside the array is often the mirror root.
#[derive(Debug, Clone, Default)]
pub struct GeometrySolver {
    config: SolverConfig,
}

impl GeometrySolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(
        &self,
        node_positions: [Point2; 3],
        timestamps: [f64; 3],
        speed_of_sound: f64,
    ) -> SolveResult<EstimatedLocation> {
        if !(speed_of_sound.is_finite() && speed_of_sound > 0.0) {
            return Err(SolveError::InvalidInput(format!(
                "speed of sound must be positive, got {}",
                speed_of_sound
            )));
        }
        if let Some(bad) = timestamps.iter().find(|t| !t.is_finite()) {
            return Err(SolveError::InvalidInput(format!(
                "timestamp {} is not finite",
                bad
            )));
        }
        if !node_positions.iter().all(Point2::is_finite) {
            return Err(SolveError::InvalidInput(
                "sensor positions must be finite".into(),
            ));
        }
        if is_collinear(&node_positions) {
            return Err(SolveError::DegenerateGeometry);
        }

        let system = RangeDifferences::new(node_positions, timestamps, speed_of_sound);
        let (position, residual, iterations) = self.minimize(&system)?;

        debug!(
            "TDOA solve converged at ({:.4}, {:.4}) after {} iterations",
            position.x, position.y, iterations
        );

        Ok(EstimatedLocation {
            position,
            bearing_degrees: position.bearing_degrees(),
            residual,
            iterations,
        })
    }

    fn minimize(&self, system: &RangeDifferences) -> SolveResult<(Point2, f64, usize)> {
        let mut estimate = Point2::centroid(&system.anchors);
        let mut damping = INITIAL_DAMPING;
        let mut iterations = 0;

        loop {
            let residuals = system.residuals(&estimate);
            let cost = residuals[0] * residuals[0] + residuals[1] * residuals[1];
            let norm = cost.sqrt();
            if !norm.is_finite() {
                return Err(SolveError::NoConvergence {
                    iterations,
                    residual: norm,
                });
            }
            if norm <= self.config.tolerance {
                return Ok((estimate, norm, iterations));
            }
            if iterations >= self.config.max_iterations {
                return Err(SolveError::NoConvergence {
                    iterations,
                    residual: norm,
                });
            }

            let jacobian = system.jacobian(&estimate);
            // Normal equations JᵀJ·δ = −Jᵀr.
            let a11 = jacobian[0][0] * jacobian[0][0] + jacobian[1][0] * jacobian[1][0];
            let a12 = jacobian[0][0] * jacobian[0][1] + jacobian[1][0] * jacobian[1][1];
            let a22 = jacobian[0][1] * jacobian[0][1] + jacobian[1][1] * jacobian[1][1];
            let g1 = jacobian[0][0] * residuals[0] + jacobian[1][0] * residuals[1];
            let g2 = jacobian[0][1] * residuals[0] + jacobian[1][1] * residuals[1];

            loop {
                let m11 = a11 + damping * a11.max(MIN_DISTANCE);
                let m22 = a22 + damping * a22.max(MIN_DISTANCE);
                let det = m11 * m22 - a12 * a12;
                if det.abs() > f64::MIN_POSITIVE {
                    let candidate = Point2::new(
                        estimate.x - (m22 * g1 - a12 * g2) / det,
                        estimate.y - (m11 * g2 - a12 * g1) / det,
                    );
                    let next = system.residuals(&candidate);
                    let next_cost = next[0] * next[0] + next[1] * next[1];
                    if candidate.is_finite() && next_cost < cost {
                        estimate = candidate;
                        damping = (damping / 10.0).max(MIN_DAMPING);
                        break;
                    }
                }
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    return Err(SolveError::NoConvergence {
                        iterations,
                        residual: norm,
                    });
                }
            }
            iterations += 1;
        }
    }
}

/// Solve with an explicit configuration; see [`GeometrySolver`].
pub fn solve(
    node_positions: [Point2; 3],
    timestamps: [f64; 3],
    speed_of_sound: f64,
    config: &SolverConfig,
) -> SolveResult<EstimatedLocation> {
    GeometrySolver::new(*config).solve(node_positions, timestamps, speed_of_sound)
}

/// Timestamps that satisfy the solver's equations exactly for a source at
/// `source`, with `reference_time` as the zero-range instant.
pub fn synthesize_timestamps(
    node_positions: &[Point2; 3],
    source: Point2,
    speed_of_sound: f64,
    reference_time: f64,
) -> [f64; 3] {
    node_positions.map(|node| reference_time - source.distance_to(&node) / speed_of_sound)
}

fn is_collinear(points: &[Point2; 3]) -> bool {
    let [a, b, c] = points;
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    let baseline = a
        .distance_to(b)
        .max(a.distance_to(c))
        .max(b.distance_to(c));
    cross.abs() <= COLLINEAR_EPSILON * baseline * baseline
}

struct RangeDifferences {
    anchors: [Point2; 3],
    delta_ab: f64,
    delta_ac: f64,
}

impl RangeDifferences {
    fn new(anchors: [Point2; 3], timestamps: [f64; 3], speed_of_sound: f64) -> Self {
        Self {
            anchors,
            delta_ab: speed_of_sound * (timestamps[1] - timestamps[0]),
            delta_ac: speed_of_sound * (timestamps[2] - timestamps[0]),
        }
    }

    fn residuals(&self, point: &Point2) -> [f64; 2] {
        let [a, b, c] = &self.anchors;
        let da = point.distance_to(a);
        [
            da - point.distance_to(b) - self.delta_ab,
            da - point.distance_to(c) - self.delta_ac,
        ]
    }

    fn jacobian(&self, point: &Point2) -> [[f64; 2]; 2] {
        let unit = |anchor: &Point2| {
            let d = point.distance_to(anchor).max(MIN_DISTANCE);
            [(point.x - anchor.x) / d, (point.y - anchor.y) / d]
        };
        let [a, b, c] = &self.anchors;
        let (ua, ub, uc) = (unit(a), unit(b), unit(c));
        [
            [ua[0] - ub[0], ua[1] - ub[1]],
            [ua[0] - uc[0], ua[1] - uc[1]],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_array() -> [Point2; 3] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(0.0, 20.0),
        ]
    }

    #[test]
    fn recovers_synthesized_sources() {
        // Each source lies in the basin of the centroid seed, so the solver
        // lands on the true crossing rather than the second root.
        let solver = GeometrySolver::new(SolverConfig {
            tolerance: 1e-9,
            max_iterations: 100,
        });
        let nodes = square_array();
        let sources = [
            Point2::new(5.0, 5.0),
            Point2::new(3.0, 20.0),
            Point2::new(12.0, -4.0),
            Point2::new(-5.0, 6.0),
            Point2::new(30.0, 30.0),
            Point2::new(8.0, 2.0),
        ];
        for source in sources {
            let timestamps = synthesize_timestamps(&nodes, source, 343.0, 1.0);
            let estimate = solver.solve(nodes, timestamps, 343.0).unwrap();
            assert!(
                estimate.position.distance_to(&source) < 1e-6,
                "source {:?} estimated at {:?}",
                source,
                estimate.position
            );
            assert!(estimate.residual <= 1e-9);
        }
    }

    #[test]
    fn reference_scenario_matches_known_solution() {
        let nodes = [
            Point2::new(9.0, 9.0),
            Point2::new(2.0, 10.0),
            Point2::new(5.0, 11.0),
        ];
        let timestamps = [0.200, 0.215, 0.210];
        let config = SolverConfig::default();

        let first = solve(nodes, timestamps, 343.0, &config).unwrap();
        assert!((first.position.x - 2.801_622).abs() < 1e-4);
        assert!((first.position.y - 9.305_108).abs() < 1e-4);
        assert!((first.bearing_degrees - 16.756_22).abs() < 1e-3);
        assert!((0.0..360.0).contains(&first.bearing_degrees));

        let a = first.position.distance_to(&nodes[0]);
        let b = first.position.distance_to(&nodes[1]);
        let c = first.position.distance_to(&nodes[2]);
        assert!((a - b - 343.0 * 0.015).abs() < 1e-6);
        assert!((a - c - 343.0 * 0.010).abs() < 1e-6);

        for _ in 0..5 {
            let again = solve(nodes, timestamps, 343.0, &config).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn collinear_nodes_are_degenerate() {
        let nodes = [
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 5.0),
            Point2::new(10.0, 10.0),
        ];
        let result = solve(nodes, [0.1, 0.2, 0.3], 343.0, &SolverConfig::default());
        assert_eq!(result, Err(SolveError::DegenerateGeometry));

        let horizontal = [
            Point2::new(-3.0, 4.0),
            Point2::new(1.0, 4.0),
            Point2::new(7.5, 4.0),
        ];
        let result = solve(horizontal, [0.0, 0.0, 0.0], 343.0, &SolverConfig::default());
        assert_eq!(result, Err(SolveError::DegenerateGeometry));
    }

    #[test]
    fn coincident_nodes_are_degenerate() {
        let p = Point2::new(1.0, 1.0);
        let result = solve([p, p, p], [0.0, 0.01, 0.02], 343.0, &SolverConfig::default());
        assert_eq!(result, Err(SolveError::DegenerateGeometry));
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let nodes = [
            Point2::new(9.0, 9.0),
            Point2::new(2.0, 10.0),
            Point2::new(5.0, 11.0),
        ];
        let config = SolverConfig {
            tolerance: 1e-9,
            max_iterations: 1,
        };
        match solve(nodes, [0.200, 0.215, 0.210], 343.0, &config) {
            Err(SolveError::NoConvergence { iterations, .. }) => assert_eq!(iterations, 1),
            other => panic!("expected NoConvergence, got {:?}", other),
        }
    }

    #[test]
    fn inconsistent_delays_do_not_converge() {
        // Half a second of delay is far longer than any baseline in the array.
        let result = solve(
            square_array(),
            [0.0, 0.5, 0.5],
            343.0,
            &SolverConfig::default(),
        );
        assert!(matches!(result, Err(SolveError::NoConvergence { .. })));
    }

    #[test]
    fn rejects_non_positive_speed_of_sound() {
        let result = solve(square_array(), [0.0, 0.0, 0.0], 0.0, &SolverConfig::default());
        assert!(matches!(result, Err(SolveError::InvalidInput(_))));
    }
}
