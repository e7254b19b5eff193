//! 2D geometry helpers shared by the road and building generators.

use bevy::prelude::*;

/// Tolerance used for float comparisons on map coordinates.
pub const EPSILON: f32 = 1e-5;

pub fn approximately(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

/// Z component of the 3D cross product.
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Rotate a map direction by `degrees` around the vertical axis.
///
/// Map `(x, y)` is treated as world `(x, 0, y)`, so positive angles turn
/// clockwise when viewed from above with +y pointing forward.
pub fn rotate_degrees(v: Vec2, degrees: f32) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos + v.y * sin, -v.x * sin + v.y * cos)
}

/// Result of intersecting segment `p..p+r` with segment `q..q+s`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineIntersection {
    /// Crossing point when both segments actually intersect.
    pub segments: Option<Vec2>,
    /// Point where the infinite extension of the first segment meets the
    /// second segment. Equal to `segments` when they intersect.
    pub lines: Option<Vec2>,
}

/// Intersect segment `a1..a2` with segment `b1..b2`. Parallel or collinear
/// segments never intersect.
pub fn intersect_line_segments(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> LineIntersection {
    let r = a2 - a1;
    let s = b2 - b1;
    let denominator = cross(r, s);
    if approximately(denominator, 0.0) {
        return LineIntersection::default();
    }

    let qp = b1 - a1;
    let t = cross(qp, s) / denominator;
    let u = cross(qp, r) / denominator;
    let point = a1 + r * t;

    let on_second = (0.0..=1.0).contains(&u);
    if (0.0..=1.0).contains(&t) && on_second {
        LineIntersection {
            segments: Some(point),
            lines: Some(point),
        }
    } else if on_second {
        LineIntersection {
            segments: None,
            lines: Some(point),
        }
    } else {
        LineIntersection::default()
    }
}

/// Two segments lie on top of each other: they share an endpoint and point
/// the same way from it.
pub fn segments_overlap(start1: Vec2, end1: Vec2, start2: Vec2, end2: Vec2) -> bool {
    let d = (end1 - start1).normalize_or_zero().dot((end2 - start2).normalize_or_zero());
    (start1 == start2 && approximately(d, 1.0))
        || (start1 == end2 && approximately(d, -1.0))
        || (end1 == start2 && approximately(d, -1.0))
        || (end1 == end2 && approximately(d, 1.0))
}

/// Compute axis-aligned bounding box of a polygon.
pub fn polygon_bounds(vertices: &[Vec2]) -> Rect {
    let mut min = Vec2::splat(f32::MAX);
    let mut max = Vec2::splat(f32::MIN);

    for &v in vertices {
        min = min.min(v);
        max = max.max(v);
    }

    Rect { min, max }
}

/// Oriented rectangle on the map, used as a building lot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub corners: [Vec2; 4],
}

impl Footprint {
    /// Rectangle with one corner at `origin`, extending `size.x` along the
    /// unit vector `along` and `size.y` along the unit vector `side`.
    pub fn new(origin: Vec2, along: Vec2, side: Vec2, size: Vec2) -> Self {
        let a = along * size.x;
        let b = side * size.y;
        Self {
            corners: [origin, origin + a, origin + a + b, origin + b],
        }
    }

    pub fn centre(&self) -> Vec2 {
        self.corners.iter().copied().sum::<Vec2>() / 4.0
    }

    pub fn bounds(&self) -> Rect {
        polygon_bounds(&self.corners)
    }

    fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        (0..4).map(move |i| (self.corners[i], self.corners[(i + 1) % 4]))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let mut sign = 0.0;
        for (a, b) in self.edges() {
            let c = cross(b - a, p - a);
            if c.abs() <= EPSILON {
                continue;
            }
            if sign != 0.0 && c.signum() != sign {
                return false;
            }
            sign = c.signum();
        }
        true
    }

    /// Whether the segment `a..b` touches the rectangle.
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        self.contains(a)
            || self.contains(b)
            || self
                .edges()
                .any(|(c, d)| intersect_line_segments(a, b, c, d).segments.is_some())
    }

    /// Separating-axis test between two rectangles. Touching edges do not
    /// count as an overlap.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        let axes = [
            self.corners[1] - self.corners[0],
            self.corners[3] - self.corners[0],
            other.corners[1] - other.corners[0],
            other.corners[3] - other.corners[0],
        ];
        axes.iter().all(|axis| {
            let axis = axis.normalize_or_zero();
            if axis == Vec2::ZERO {
                return true;
            }
            let (min_a, max_a) = project(&self.corners, axis);
            let (min_b, max_b) = project(&other.corners, axis);
            min_a < max_b - EPSILON && min_b < max_a - EPSILON
        })
    }
}

fn project(corners: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    corners.iter().fold((f32::MAX, f32::MIN), |(lo, hi), c| {
        let d = c.dot(axis);
        (lo.min(d), hi.max(d))
    })
}
