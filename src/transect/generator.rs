//! Station walk along a single polyline.
//!
//! Stations are placed at `k * distance` for `k = 0, 1, 2, ...` up to and
//! including the line length. Positions are computed from the step counter
//! rather than by repeated addition, so long lines do not drift. The last
//! step is kept when it overshoots the length by no more than
//! [`Tolerance::relative_to`] of the length, and its position clamps onto
//! the final vertex.

use std::iter::FusedIterator;

use crate::geom::{Point2, Polyline2, PolylineError, Segment2, Tolerance};

use super::params::{ParameterError, Side, StationParameters};
use super::record::TransectRecord;

/// Errors raised before a station walk starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransectError {
    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error("degenerate line: {0}")]
    DegenerateLine(#[from] PolylineError),

    #[error(
        "a line of length {length} at distance {distance} needs more than {max} stations",
        max = MAX_STATIONS
    )]
    TooManyStations { length: f64, distance: f64 },

    #[error("station numbering starting at {start} overflows after {count} stations")]
    StationIndexOverflow { start: usize, count: usize },
}

/// Upper bound on the stations of a single walk.
pub const MAX_STATIONS: usize = u32::MAX as usize;

/// Number of stations a walk over `total_length` produces, or `None` when
/// it would exceed [`MAX_STATIONS`].
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn station_count(total_length: f64, distance: f64) -> Option<usize> {
    let slack = Tolerance::DEFAULT.relative_to(total_length);
    let steps = ((total_length + slack) / distance).floor();
    if !steps.is_finite() || steps < 0.0 || steps >= MAX_STATIONS as f64 {
        return None;
    }
    Some(steps as usize + 1)
}

/// Builds the transect segment for a station.
///
/// `angle_deg` is the absolute direction of the transect. `Right` runs from
/// the point projected by `+length` back to the station, `Left` from the
/// station to the point projected by `-length`, and `Both` between the two
/// projections.
#[must_use]
pub fn calc_transect(point: Point2, angle_deg: f64, length: f64, side: Side) -> Segment2 {
    match side {
        Side::Right => Segment2::new(point.project(length, angle_deg), point),
        Side::Left => Segment2::new(point, point.project(-length, angle_deg)),
        Side::Both => Segment2::new(
            point.project(length, angle_deg),
            point.project(-length, angle_deg),
        ),
    }
}

/// Lazy iterator over the transects of one polyline.
#[derive(Debug, Clone)]
pub struct Stations<'a> {
    line: &'a Polyline2,
    params: StationParameters,
    source_line_id: usize,
    start_station_index: usize,
    count: usize,
    next_station_index: usize,
    step: usize,
}

impl Stations<'_> {
    /// Station index the next part of the same feature starts from.
    #[must_use]
    pub fn next_station_index(&self) -> usize {
        self.next_station_index
    }

    /// Total number of stations of the walk, emitted or not.
    #[must_use]
    pub fn station_count(&self) -> usize {
        self.count
    }
}

impl Iterator for Stations<'_> {
    type Item = TransectRecord;

    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.count {
            return None;
        }

        let chainage = (self.step as f64 * self.params.distance).min(self.line.length());
        let sample = self.line.sample_at(chainage, self.params.vertex_angle);
        let transect_angle = self.params.angle_deg + sample.tangent_angle.to_degrees();
        let station_index = self.start_station_index + self.step;
        self.step += 1;

        Some(TransectRecord {
            source_line_id: self.source_line_id,
            station_index,
            segment_index: station_index + 1,
            angle_deg: self.params.angle_deg,
            length: self.params.length,
            side: self.params.side,
            chainage,
            geometry: calc_transect(
                sample.point,
                transect_angle,
                self.params.length,
                self.params.side,
            ),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.step;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Stations<'_> {}

impl FusedIterator for Stations<'_> {}

/// Walks `line` and yields one transect per station.
///
/// Returns the iterator together with the station index the next part of
/// the same feature should start from.
///
/// # Errors
/// Returns [`TransectError::Parameters`] when `params` fails validation,
/// [`TransectError::TooManyStations`] when the walk exceeds
/// [`MAX_STATIONS`] and [`TransectError::StationIndexOverflow`] when the
/// numbering would not fit in `usize`. No station is produced in any case.
pub fn generate_stations<'a>(
    line: &'a Polyline2,
    params: &StationParameters,
    start_station_index: usize,
    source_line_id: usize,
) -> Result<(Stations<'a>, usize), TransectError> {
    params.validate()?;

    let count = station_count(line.length(), params.distance).ok_or(
        TransectError::TooManyStations {
            length: line.length(),
            distance: params.distance,
        },
    )?;
    let next = start_station_index
        .checked_add(count)
        .ok_or(TransectError::StationIndexOverflow {
            start: start_station_index,
            count,
        })?;

    let stations = Stations {
        line,
        params: *params,
        source_line_id,
        start_station_index,
        count,
        next_station_index: next,
        step: 0,
    };
    Ok((stations, next))
}

/// Builds every part first, then collects the transects of all parts with
/// contiguous station numbering.
///
/// # Errors
/// Fails without producing records if the parameters are invalid or any
/// part has fewer than 2 vertices.
pub fn generate_feature_stations(
    parts: &[Vec<Point2>],
    params: &StationParameters,
    start_station_index: usize,
    source_line_id: usize,
) -> Result<(Vec<TransectRecord>, usize), TransectError> {
    params.validate()?;
    let lines = parts
        .iter()
        .map(|part| Polyline2::new(part.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::new();
    let mut next = start_station_index;
    for line in &lines {
        let (stations, following) = generate_stations(line, params, next, source_line_id)?;
        records.extend(stations);
        next = following;
    }
    Ok((records, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn approx_eq_point(a: Point2, b: Point2) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
    }

    fn horizontal(length: f64) -> Polyline2 {
        Polyline2::new(vec![Point2::new(0.0, 0.0), Point2::new(length, 0.0)]).unwrap()
    }

    #[test]
    fn test_station_count_inclusive() {
        assert_eq!(station_count(10.0, 5.0), Some(3));
        assert_eq!(station_count(12.0, 5.0), Some(3));
        assert_eq!(station_count(4.0, 5.0), Some(1));
        assert_eq!(station_count(0.0, 5.0), Some(1));
    }

    #[test]
    fn test_station_count_rejects_huge_walks() {
        assert_eq!(station_count(10.0, 1e-300), None);
        assert_eq!(station_count(1e20, 0.001), None);
        assert_eq!(station_count(f64::MAX, 1e-3), None);
        assert_eq!(station_count(1000.0, 0.001), Some(1_000_001));
    }

    #[test]
    fn test_too_many_stations_is_an_error() {
        let line = horizontal(1e20);
        let result = generate_stations(&line, &StationParameters::new(0.001), 0, 1);
        assert!(matches!(
            result,
            Err(TransectError::TooManyStations { distance, .. }) if distance == 0.001
        ));
    }

    #[test]
    fn test_station_index_overflow_is_an_error() {
        let line = horizontal(10.0);
        let result = generate_stations(&line, &StationParameters::new(5.0), usize::MAX - 1, 1);
        assert!(matches!(
            result,
            Err(TransectError::StationIndexOverflow { count: 3, .. })
        ));
        let (_, next) =
            generate_stations(&line, &StationParameters::new(5.0), usize::MAX - 3, 1).unwrap();
        assert_eq!(next, usize::MAX);
    }

    #[test]
    fn test_right_side_example() {
        let line = horizontal(10.0);
        let params = StationParameters::new(5.0)
            .with_length(2.0)
            .with_angle(90.0)
            .with_side(Side::Right);
        let (stations, next) = generate_stations(&line, &params, 0, 1).unwrap();
        let records: Vec<_> = stations.collect();

        assert_eq!(next, 3);
        assert_eq!(records.len(), 3);
        for (record, x) in records.iter().zip([0.0, 5.0, 10.0]) {
            assert!(approx_eq_point(record.geometry.start, Point2::new(x, 2.0)));
            assert_eq!(record.geometry.end, Point2::new(x, 0.0));
            assert_eq!(record.segment_index, record.station_index + 1);
            assert_eq!(record.angle_deg, 90.0);
            assert_eq!(record.length, 2.0);
            assert_eq!(record.orientation(), "R");
        }
    }

    #[test]
    fn test_left_side_keeps_station_as_start() {
        let line = horizontal(10.0);
        let params = StationParameters::new(5.0).with_length(2.0).with_side(Side::Left);
        let (stations, _) = generate_stations(&line, &params, 0, 1).unwrap();
        for record in stations {
            assert_eq!(record.geometry.start.y, 0.0);
            assert!(approx_eq(record.geometry.end.y, -2.0));
        }
    }

    #[test]
    fn test_both_sides_straddle_line() {
        let line = horizontal(100.0);
        let params = StationParameters::new(30.0).with_length(4.0);
        let (stations, next) = generate_stations(&line, &params, 0, 1).unwrap();
        let records: Vec<_> = stations.collect();

        assert_eq!(next, 4);
        let xs: Vec<_> = records.iter().map(|r| r.chainage).collect();
        assert_eq!(xs, [0.0, 30.0, 60.0, 90.0]);
        for record in &records {
            assert!(approx_eq(record.geometry.length(), 8.0));
            assert!(approx_eq(record.geometry.midpoint().y, 0.0));
            assert!(approx_eq(record.geometry.start.x, record.chainage));
            assert!(approx_eq(record.geometry.end.x, record.chainage));
            assert_ne!(record.geometry.start.y, 0.0);
            assert_ne!(record.geometry.end.y, 0.0);
        }
    }

    #[test]
    fn test_zero_length_transects_are_emitted() {
        let line = horizontal(10.0);
        let params = StationParameters::new(5.0).with_length(0.0);
        let (stations, _) = generate_stations(&line, &params, 0, 1).unwrap();
        let records: Vec<_> = stations.collect();
        assert_eq!(records.len(), 3);
        for record in records {
            assert!(approx_eq_point(record.geometry.start, record.geometry.end));
            assert!(approx_eq(record.geometry.length(), 0.0));
        }
    }

    #[test]
    fn test_rejects_non_positive_distance_before_walk() {
        let line = horizontal(10.0);
        for distance in [0.0, -1.0] {
            let result = generate_stations(&line, &StationParameters::new(distance), 0, 1);
            assert!(matches!(
                result,
                Err(TransectError::Parameters(ParameterError::InvalidDistance { .. }))
            ));
        }
    }

    #[test]
    fn test_drift_keeps_final_station() {
        let line = horizontal(0.3);
        let (stations, next) = generate_stations(&line, &StationParameters::new(0.1), 0, 1).unwrap();
        let records: Vec<_> = stations.collect();
        assert_eq!(next, 4);
        let last = records.last().unwrap();
        assert_eq!(last.chainage, 0.3);
        assert!(approx_eq(last.geometry.midpoint().x, 0.3));
    }

    #[test]
    fn test_angle_offset_follows_tangent() {
        let line = Polyline2::new(vec![Point2::new(0.0, 0.0), Point2::new(0.0, 10.0)]).unwrap();
        let params = StationParameters::new(10.0).with_length(1.0).with_side(Side::Right);
        let (stations, _) = generate_stations(&line, &params, 0, 1).unwrap();
        let first = stations.into_iter().next().unwrap();
        // Tangent points north, so 90° more points west.
        assert!(approx_eq_point(first.geometry.start, Point2::new(-1.0, 0.0)));
    }

    #[test]
    fn test_start_index_is_threaded() {
        let line = horizontal(10.0);
        let (stations, next) = generate_stations(&line, &StationParameters::new(5.0), 7, 2).unwrap();
        let indices: Vec<_> = stations.map(|r| (r.source_line_id, r.station_index)).collect();
        assert_eq!(indices, [(2, 7), (2, 8), (2, 9)]);
        assert_eq!(next, 10);
    }

    #[test]
    fn test_iterator_is_exact_size() {
        let line = horizontal(10.0);
        let (mut stations, _) = generate_stations(&line, &StationParameters::new(2.0), 0, 1).unwrap();
        assert_eq!(stations.len(), 6);
        stations.next();
        assert_eq!(stations.len(), 5);
    }

    #[test]
    fn test_multi_part_feature_numbering() {
        let parts = vec![
            vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)],
            vec![Point2::new(0.0, 20.0), Point2::new(10.0, 20.0)],
        ];
        let (records, next) =
            generate_feature_stations(&parts, &StationParameters::new(5.0), 0, 1).unwrap();
        let indices: Vec<_> = records.iter().map(|r| r.station_index).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4, 5]);
        assert_eq!(next, 6);
        assert_eq!(records[3].chainage, 0.0);
    }

    #[test]
    fn test_degenerate_part_fails_whole_feature() {
        let parts = vec![
            vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)],
            vec![Point2::new(5.0, 5.0)],
        ];
        let result = generate_feature_stations(&parts, &StationParameters::new(5.0), 0, 1);
        assert_eq!(
            result,
            Err(TransectError::DegenerateLine(
                PolylineError::InsufficientPoints { count: 1 }
            ))
        );
    }
}
