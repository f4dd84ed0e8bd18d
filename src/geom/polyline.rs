//! Arc-length parameterized 2D polylines.
//!
//! A [`Polyline2`] caches the cumulative arc length at every vertex so that
//! positions along the line can be located with a binary search. All
//! distances passed to the sampling functions are arc lengths measured from
//! the first vertex; values outside `[0, length]` clamp to the ends.
//!
//! # Example
//!
//! ```
//! use transect_engine::geom::{Point2, Polyline2, VertexAngle};
//!
//! let line = Polyline2::new(vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)]).unwrap();
//! assert_eq!(line.length(), 10.0);
//! assert_eq!(line.interpolate(2.5), Point2::new(2.5, 0.0));
//! assert_eq!(line.tangent_angle_at(2.5, VertexAngle::Bisector), 0.0);
//! ```

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use super::core::{Point2, Tolerance};

/// Errors raised when building a polyline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolylineError {
    /// The input has fewer than 2 vertices, so no arc length exists.
    #[error("polyline must have at least 2 points, got {count}")]
    InsufficientPoints { count: usize },

    /// A vertex has a NaN or infinite coordinate.
    #[error("polyline vertex {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

/// How the tangent direction is chosen when a position falls on a vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VertexAngle {
    /// Mean direction of the incoming and outgoing segments.
    #[default]
    Bisector,
    /// Direction of the segment leaving the vertex (incoming at the end of an open line).
    Outgoing,
}

/// A position on a polyline with its local direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineSample {
    /// The sampled position.
    pub point: Point2,
    /// Tangent direction in radians, counter-clockwise from +X.
    pub tangent_angle: f64,
    /// Arc length of the sample, clamped to the line.
    pub distance: f64,
    /// Index of the segment containing the sample.
    pub segment: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline2 {
    points: Vec<Point2>,
    cumulative: Vec<f64>,
}

impl Polyline2 {
    /// Builds a polyline from its vertices.
    ///
    /// # Errors
    /// Returns an error for fewer than 2 vertices or non-finite coordinates.
    pub fn new(points: Vec<Point2>) -> Result<Self, PolylineError> {
        if points.len() < 2 {
            return Err(PolylineError::InsufficientPoints {
                count: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(PolylineError::NonFiniteCoordinate { index });
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut accumulated = 0.0;
        cumulative.push(accumulated);
        for pair in points.windows(2) {
            accumulated += pair[0].distance_to(pair[1]);
            cumulative.push(accumulated);
        }

        Ok(Self { points, cumulative })
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Total arc length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Returns `true` when the first and last vertex coincide and the line has length.
    #[must_use]
    pub fn is_closed(&self, tol: Tolerance) -> bool {
        self.points.len() > 2
            && !tol.is_zero_length(self.length())
            && tol.approx_eq_point2(self.points[0], self.points[self.points.len() - 1])
    }

    /// Point at arc length `distance`, linearly interpolated within its segment.
    #[must_use]
    pub fn interpolate(&self, distance: f64) -> Point2 {
        let distance = self.clamp_distance(distance);
        let segment = self.segment_at(distance);
        self.point_on_segment(segment, distance)
    }

    /// Tangent direction (radians, counter-clockwise from +X) at arc length `distance`.
    #[must_use]
    pub fn tangent_angle_at(&self, distance: f64, policy: VertexAngle) -> f64 {
        let distance = self.clamp_distance(distance);
        self.tangent_angle_clamped(distance, self.segment_at(distance), policy)
    }

    /// Samples position and direction in one lookup.
    #[must_use]
    pub fn sample_at(&self, distance: f64, policy: VertexAngle) -> PolylineSample {
        let distance = self.clamp_distance(distance);
        let segment = self.segment_at(distance);
        PolylineSample {
            point: self.point_on_segment(segment, distance),
            tangent_angle: self.tangent_angle_clamped(distance, segment, policy),
            distance,
            segment,
        }
    }

    fn clamp_distance(&self, distance: f64) -> f64 {
        if distance.is_nan() {
            return 0.0;
        }
        distance.clamp(0.0, self.length())
    }

    /// Index of the segment containing `distance` (already clamped).
    fn segment_at(&self, distance: f64) -> usize {
        let after = self.cumulative.partition_point(|&c| c <= distance);
        after.saturating_sub(1).min(self.segment_count() - 1)
    }

    fn segment_length(&self, segment: usize) -> f64 {
        self.cumulative[segment + 1] - self.cumulative[segment]
    }

    fn point_on_segment(&self, segment: usize, distance: f64) -> Point2 {
        let seg_len = self.segment_length(segment);
        let local = if Tolerance::ZERO_LENGTH.is_zero_length(seg_len) {
            0.0
        } else {
            ((distance - self.cumulative[segment]) / seg_len).clamp(0.0, 1.0)
        };
        self.points[segment].lerp(self.points[segment + 1], local)
    }

    fn segment_angle(&self, segment: usize) -> Option<f64> {
        if Tolerance::ZERO_LENGTH.is_zero_length(self.segment_length(segment)) {
            return None;
        }
        Some((self.points[segment + 1] - self.points[segment]).angle())
    }

    /// Direction of the last non-degenerate segment ending at or before `vertex`.
    fn incoming_angle(&self, vertex: usize) -> Option<f64> {
        (0..vertex).rev().find_map(|segment| self.segment_angle(segment))
    }

    /// Direction of the first non-degenerate segment starting at or after `vertex`.
    fn outgoing_angle(&self, vertex: usize) -> Option<f64> {
        (vertex..self.segment_count()).find_map(|segment| self.segment_angle(segment))
    }

    fn vertex_at(&self, distance: f64) -> Option<usize> {
        let eps = Tolerance::DEFAULT.relative_to(self.length());
        let after = self.cumulative.partition_point(|&c| c < distance - eps);
        (after < self.cumulative.len() && (self.cumulative[after] - distance).abs() <= eps)
            .then_some(after)
    }

    fn tangent_angle_clamped(&self, distance: f64, segment: usize, policy: VertexAngle) -> f64 {
        let last = self.points.len() - 1;
        let closed = self.is_closed(Tolerance::DEFAULT);

        let angle = match self.vertex_at(distance) {
            Some(vertex) => {
                // Closed lines wrap around their seam.
                let incoming = if vertex == 0 {
                    closed.then(|| self.incoming_angle(last)).flatten()
                } else {
                    self.incoming_angle(vertex)
                };
                let outgoing = if vertex == last {
                    closed.then(|| self.outgoing_angle(0)).flatten()
                } else {
                    self.outgoing_angle(vertex)
                };

                match (incoming, outgoing, policy) {
                    (Some(a), Some(b), VertexAngle::Bisector) => Some(average_angle(a, b)),
                    (_, Some(b), _) => Some(b),
                    (Some(a), None, _) => Some(a),
                    (None, None, _) => None,
                }
            }
            None => self
                .segment_angle(segment)
                .or_else(|| self.outgoing_angle(segment))
                .or_else(|| self.incoming_angle(segment)),
        };

        angle.unwrap_or(0.0)
    }
}

/// Mean of two directions, taken along the shorter arc between them.
#[must_use]
pub fn average_angle(a: f64, b: f64) -> f64 {
    let mut delta = (b - a) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta <= -PI {
        delta += TAU;
    }
    a + delta / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use std::f64::consts::FRAC_PI_4;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn line(points: &[(f64, f64)]) -> Polyline2 {
        Polyline2::new(points.iter().copied().map(Point2::from).collect()).unwrap()
    }

    #[test]
    fn test_rejects_short_input() {
        assert_eq!(
            Polyline2::new(vec![]),
            Err(PolylineError::InsufficientPoints { count: 0 })
        );
        assert_eq!(
            Polyline2::new(vec![Point2::new(1.0, 1.0)]),
            Err(PolylineError::InsufficientPoints { count: 1 })
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        let result = Polyline2::new(vec![Point2::new(0.0, 0.0), Point2::new(f64::NAN, 1.0)]);
        assert_eq!(result, Err(PolylineError::NonFiniteCoordinate { index: 1 }));
    }

    #[test]
    fn test_length_and_interpolate() {
        let l = line(&[(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]);
        assert!(approx_eq(l.length(), 11.0));
        assert_eq!(l.interpolate(0.0), Point2::new(0.0, 0.0));
        assert_eq!(l.interpolate(5.0), Point2::new(3.0, 4.0));
        assert!(approx_eq(l.interpolate(8.0).y, 7.0));
        assert_eq!(l.interpolate(11.0), Point2::new(3.0, 10.0));
    }

    #[test]
    fn test_interpolate_clamps_overshoot() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(l.interpolate(10.000_000_1), Point2::new(10.0, 0.0));
        assert_eq!(l.interpolate(-1.0), Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_tangent_inside_segment() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert!(approx_eq(l.tangent_angle_at(4.0, VertexAngle::Bisector), 0.0));
        assert!(approx_eq(l.tangent_angle_at(14.0, VertexAngle::Bisector), FRAC_PI_2));
    }

    #[test]
    fn test_tangent_at_interior_vertex() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert!(approx_eq(l.tangent_angle_at(10.0, VertexAngle::Bisector), FRAC_PI_4));
        assert!(approx_eq(l.tangent_angle_at(10.0, VertexAngle::Outgoing), FRAC_PI_2));
    }

    #[test]
    fn test_tangent_at_open_ends() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert!(approx_eq(l.tangent_angle_at(0.0, VertexAngle::Bisector), 0.0));
        assert!(approx_eq(l.tangent_angle_at(20.0, VertexAngle::Bisector), FRAC_PI_2));
        assert!(approx_eq(l.tangent_angle_at(20.0, VertexAngle::Outgoing), FRAC_PI_2));
    }

    #[test]
    fn test_tangent_wraps_on_closed_line() {
        let square = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        assert!(square.is_closed(Tolerance::default_geom()));
        // Incoming edge points down (-90°), outgoing edge points east (0°).
        assert!(approx_eq(square.tangent_angle_at(0.0, VertexAngle::Bisector), -FRAC_PI_4));
        assert!(approx_eq(square.tangent_angle_at(40.0, VertexAngle::Bisector), -FRAC_PI_4));
    }

    #[test]
    fn test_tangent_skips_duplicate_vertices() {
        let l = line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);
        assert!(approx_eq(l.tangent_angle_at(5.0, VertexAngle::Bisector), FRAC_PI_4));
        assert!(approx_eq(l.tangent_angle_at(7.0, VertexAngle::Bisector), FRAC_PI_2));
    }

    #[test]
    fn test_zero_length_line() {
        let l = line(&[(2.0, 3.0), (2.0, 3.0)]);
        assert_eq!(l.length(), 0.0);
        assert_eq!(l.interpolate(0.0), Point2::new(2.0, 3.0));
        assert_eq!(l.tangent_angle_at(0.0, VertexAngle::Bisector), 0.0);
        assert!(!l.is_closed(Tolerance::default_geom()));
    }

    #[test]
    fn test_average_angle_wraps() {
        assert!(approx_eq(average_angle(0.0, FRAC_PI_2), FRAC_PI_4));
        let across_seam = average_angle(170f64.to_radians(), -170f64.to_radians());
        assert!(approx_eq(across_seam.cos(), -1.0));
    }

    #[test]
    fn test_sample_at_reports_segment() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let sample = l.sample_at(15.0, VertexAngle::Bisector);
        assert_eq!(sample.segment, 1);
        assert_eq!(sample.point, Point2::new(10.0, 5.0));
        assert!(approx_eq(sample.tangent_angle, FRAC_PI_2));
        assert_eq!(sample.distance, 15.0);
    }
}
