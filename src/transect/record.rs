use serde::Serialize;

use crate::geom::Segment2;

use super::params::Side;

/// One transect emitted at a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransectRecord {
    /// 1-based position of the source feature.
    pub source_line_id: usize,
    /// 0-based station counter, contiguous over all parts of a feature.
    pub station_index: usize,
    /// Always `station_index + 1`.
    pub segment_index: usize,
    /// Configured angle, not the absolute transect direction.
    pub angle_deg: f64,
    /// Configured length.
    pub length: f64,
    pub side: Side,
    /// Arc length of the station along its part.
    pub chainage: f64,
    pub geometry: Segment2,
}

impl TransectRecord {
    /// Orientation code written to the output (`"L"`, `"R"` or `"B"`).
    #[must_use]
    pub const fn orientation(&self) -> &'static str {
        self.side.code()
    }
}
