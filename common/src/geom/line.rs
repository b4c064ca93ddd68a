use super::point::Point;
use super::rect::Rect;
use serde::{Deserialize, Serialize};

pub const GEOM_TOLERANCE: f64 = 1e-6;

/// A straight segment between two float points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatLine {
    pub a: Point<f64>,
    pub b: Point<f64>,
}

impl FloatLine {
    pub fn new(a: Point<f64>, b: Point<f64>) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    pub fn is_point(&self) -> bool {
        self.a.approx_eq(self.b, GEOM_TOLERANCE)
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::from_corners(self.a, self.b)
    }

    pub fn reversed(&self) -> FloatLine {
        FloatLine::new(self.b, self.a)
    }

    pub fn dx(&self) -> f64 {
        (self.b.x - self.a.x).abs()
    }

    pub fn dy(&self) -> f64 {
        (self.b.y - self.a.y).abs()
    }

    pub fn has_endpoint(&self, p: Point<f64>) -> bool {
        self.a.approx_eq(p, GEOM_TOLERANCE) || self.b.approx_eq(p, GEOM_TOLERANCE)
    }

    /// Squared distance from `p` to the closest point of the segment.
    pub fn distance_square_to(&self, p: Point<f64>) -> f64 {
        let vx = self.b.x - self.a.x;
        let vy = self.b.y - self.a.y;
        let len_sq = vx * vx + vy * vy;
        if len_sq <= GEOM_TOLERANCE * GEOM_TOLERANCE {
            return self.a.distance_square(p);
        }
        let t = (((p.x - self.a.x) * vx + (p.y - self.a.y) * vy) / len_sq).clamp(0.0, 1.0);
        let proj = Point::new(self.a.x + t * vx, self.a.y + t * vy);
        proj.distance_square(p)
    }

    pub fn is_collinear_with(&self, other: &FloatLine) -> bool {
        orientation(self.a, self.b, other.a) == 0 && orientation(self.a, self.b, other.b) == 0
    }

    /// True if the segments share at least one point.
    pub fn intersects(&self, other: &FloatLine) -> bool {
        if !self
            .bounding_box()
            .expand(GEOM_TOLERANCE)
            .overlaps(&other.bounding_box())
        {
            return false;
        }

        let o1 = orientation(self.a, self.b, other.a);
        let o2 = orientation(self.a, self.b, other.b);
        let o3 = orientation(other.a, other.b, self.a);
        let o4 = orientation(other.a, other.b, self.b);

        if o1 != o2 && o3 != o4 {
            return true;
        }

        (o1 == 0 && on_segment(other.a, self.a, self.b))
            || (o2 == 0 && on_segment(other.b, self.a, self.b))
            || (o3 == 0 && on_segment(self.a, other.a, other.b))
            || (o4 == 0 && on_segment(self.b, other.a, other.b))
    }
}

fn orientation(p: Point<f64>, q: Point<f64>, r: Point<f64>) -> i32 {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val.abs() < GEOM_TOLERANCE {
        0
    } else if val > 0.0 {
        1
    } else {
        2
    }
}

fn on_segment(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> bool {
    p.x >= a.x.min(b.x) - GEOM_TOLERANCE
        && p.x <= a.x.max(b.x) + GEOM_TOLERANCE
        && p.y >= a.y.min(b.y) - GEOM_TOLERANCE
        && p.y <= a.y.max(b.y) + GEOM_TOLERANCE
}
