//! Convex polygon intersection by half-plane clipping.
//!
//! Coordinates are kept in `f64` here even though boxes are `f32`: a clipped
//! polygon accumulates one intersection per edge and the shoelace sum
//! cancels large terms.

use crate::pair::RotatedBBox;

pub type Point = [f64; 2];

/// Ordered vertex list of a simple polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Corners of `rbox`, rotated about its centre by `rbox.angle` degrees.
    ///
    /// Rotation convention: `x' = cx + dx*cos(a) - dy*sin(a)` and
    /// `y' = cy + dx*sin(a) + dy*cos(a)`. Positive angles turn
    /// counter-clockwise when y points up, which shows as clockwise in image
    /// coordinates where y points down. Detector angles must use the same
    /// convention or rotated IoU silently drops.
    pub fn from_rotated(rbox: &RotatedBBox) -> Self {
        let ltrb = rbox.bbox.as_ltrb();
        let (l, t, r, b) = (
            ltrb.left() as f64,
            ltrb.top() as f64,
            ltrb.right() as f64,
            ltrb.bottom() as f64,
        );

        let (cx, cy) = ((l + r) / 2.0, (t + b) / 2.0);
        let (sin, cos) = (rbox.angle as f64).to_radians().sin_cos();

        let points = [[l, t], [r, t], [r, b], [l, b]]
            .iter()
            .map(|&[x, y]| {
                let (dx, dy) = (x - cx, y - cy);

                [cx + dx * cos - dy * sin, cy + dx * sin + dy * cos]
            })
            .collect();

        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.len() < 3
    }

    /// Shoelace sum; positive for counter-clockwise vertex order in a y-up frame.
    pub fn signed_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let n = self.points.len();
        let twice = (0..n)
            .map(|i| {
                let [x0, y0] = self.points[i];
                let [x1, y1] = self.points[(i + 1) % n];

                x0 * y1 - x1 * y0
            })
            .sum::<f64>();

        twice / 2.0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Clips `self` against every edge of the convex polygon `clip`
    /// (Sutherland-Hodgman). Both vertex orders are accepted.
    pub fn clip(&self, clip: &Polygon) -> Polygon {
        if self.is_empty() || clip.is_empty() {
            return Polygon::new(vec![]);
        }

        // keep points on the left of each clip edge, flipped for clockwise clips
        let orientation = if clip.signed_area() < 0.0 { -1.0 } else { 1.0 };
        let mut output = self.points.clone();
        let n = clip.points.len();

        for i in 0..n {
            if output.is_empty() {
                break;
            }

            let a = clip.points[i];
            let b = clip.points[(i + 1) % n];
            let side = |p: &Point| orientation * cross(a, b, *p);

            let input = std::mem::take(&mut output);
            let m = input.len();

            for j in 0..m {
                let current = input[j];
                let previous = input[(j + m - 1) % m];
                let (cur_side, prev_side) = (side(&current), side(&previous));

                if cur_side >= 0.0 {
                    if prev_side < 0.0 {
                        output.push(line_intersection(previous, current, prev_side, cur_side));
                    }
                    output.push(current);
                } else if prev_side >= 0.0 {
                    output.push(line_intersection(previous, current, prev_side, cur_side));
                }
            }
        }

        Polygon::new(output)
    }

    #[inline]
    pub fn intersection_area(&self, other: &Polygon) -> f64 {
        self.clip(other).area()
    }
}

/// `(b - a) x (p - a)`
#[inline]
fn cross(a: Point, b: Point, p: Point) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Point where segment `p -> q` crosses the clip line, given the signed
/// distances (up to a common factor) of both ends.
#[inline]
fn line_intersection(p: Point, q: Point, p_side: f64, q_side: f64) -> Point {
    let t = p_side / (p_side - q_side);

    [p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]
}
