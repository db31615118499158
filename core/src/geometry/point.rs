use serde::{Deserialize, Serialize};

/// Planar coordinate in metres. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn centroid(points: &[Point2; 3]) -> Point2 {
        Point2::new(
            (points[0].x + points[1].x + points[2].x) / 3.0,
            (points[0].y + points[1].y + points[2].y) / 3.0,
        )
    }

    /// Bearing of this point seen from the origin, clockwise from +Y, in `[0, 360)`.
    pub fn bearing_degrees(&self) -> f64 {
        let degrees = self.x.atan2(self.y).to_degrees().rem_euclid(360.0);
        if degrees >= 360.0 {
            0.0
        } else {
            degrees
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(value: [f64; 2]) -> Self {
        Point2::new(value[0], value[1])
    }
}

impl From<Point2> for [f64; 2] {
    fn from(value: Point2) -> Self {
        [value.x, value.y]
    }
}

impl From<(f64, f64)> for Point2 {
    fn from(value: (f64, f64)) -> Self {
        Point2::new(value.0, value.1)
    }
}
