mod core;
mod polyline;

pub use core::{Point2, Segment2, Tolerance, Vec2};
pub use polyline::{PolylineError, PolylineSample, Polyline2, VertexAngle, average_angle};
