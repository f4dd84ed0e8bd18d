//! The "Transect at fixed distance" processing algorithm.
//!
//! [`StationLinesAlgorithm::process`] streams features from a
//! [`FeatureSource`], walks every part of every line and writes each
//! transect to the [`FeatureSink`] as soon as it is built. Output features
//! carry the input attributes followed by the six `TR_*` fields.

use serde::Serialize;

use crate::feature::{
    AttributeValue, Feature, FeatureSink, FeatureSource, Feedback, Field, FieldType, Fields,
};
use crate::geom::{Polyline2, PolylineError};
use crate::transect::{
    DEFAULT_ANGLE, DEFAULT_DISTANCE, DEFAULT_LENGTH, MAX_ANGLE, MIN_DISTANCE, ParameterError,
    Side, StationNumbering, StationParameters, TransectError, TransectRecord, generate_stations,
};

/// Algorithm identifier inside its provider.
pub const ALGORITHM_ID: &str = "stationlines";
pub const ALGORITHM_NAME: &str = "Transect at fixed distance";

pub const FIELD_SOURCE_ID: &str = "TR_FID";
pub const FIELD_STATION: &str = "TR_ID";
pub const FIELD_SEGMENT: &str = "TR_SEGMENT";
pub const FIELD_ANGLE: &str = "TR_ANGLE";
pub const FIELD_LENGTH: &str = "TR_LENGTH";
pub const FIELD_ORIENT: &str = "TR_ORIENT";

const ANGLE_DECIMALS: u32 = 2;
const LENGTH_DECIMALS: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("invalid parameters: {0}")]
    Parameters(#[from] ParameterError),

    #[error(transparent)]
    Transect(#[from] TransectError),

    #[error("feature {source_line_id} has a degenerate line: {source}")]
    DegenerateGeometry {
        source_line_id: usize,
        #[source]
        source: PolylineError,
    },

    #[error("could not create the output sink")]
    InvalidSink,

    #[error("could not write transect {station_index} of feature {source_line_id} to the output sink")]
    SinkWrite {
        source_line_id: usize,
        station_index: usize,
    },
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    /// Features taken from the source, including skipped ones.
    pub features_read: usize,
    /// Features without geometry.
    pub features_skipped: usize,
    pub parts: usize,
    pub transects_written: usize,
    pub canceled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    LineSource,
    Distance,
    Number,
    Enum,
    LineSink,
}

/// Host-facing description of one input of the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParameterKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "has_no_options")]
    pub options: &'static [&'static str],
}

fn has_no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

impl ParameterDefinition {
    const fn new(name: &'static str, description: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            description,
            kind,
            default: None,
            min: None,
            max: None,
            options: &[],
        }
    }

    const fn range(mut self, default: f64, min: f64, max: Option<f64>) -> Self {
        self.default = Some(default);
        self.min = Some(min);
        self.max = max;
        self
    }

    /// Checks `value` against the declared bounds.
    ///
    /// # Errors
    /// Returns [`ParameterError::OutOfRange`] outside `[min, max]`.
    pub fn check(&self, value: f64) -> Result<(), ParameterError> {
        let min = self.min.unwrap_or(f64::NEG_INFINITY);
        let max = self.max.unwrap_or(f64::INFINITY);
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ParameterError::OutOfRange {
                name: self.name,
                value,
                min,
                max,
            })
        }
    }
}

const SIDE_OPTIONS: &[&str] = &["Left", "Right", "Both"];

/// Parameter definitions in host order.
pub const PARAMETERS: &[ParameterDefinition] = &[
    ParameterDefinition::new("INPUT", "Line(s)", ParameterKind::LineSource),
    ParameterDefinition::new(
        "DISTANCE",
        "Fixed distance between transects",
        ParameterKind::Distance,
    )
    .range(DEFAULT_DISTANCE, MIN_DISTANCE, None),
    ParameterDefinition::new("LENGTH", "Length of the transect", ParameterKind::Distance)
        .range(DEFAULT_LENGTH, 0.0, None),
    ParameterDefinition::new(
        "ANGLE",
        "Angle in degrees from the input line at the vertices",
        ParameterKind::Number,
    )
    .range(DEFAULT_ANGLE, 0.0, Some(MAX_ANGLE)),
    ParameterDefinition {
        options: SIDE_OPTIONS,
        default: Some(2.0),
        ..ParameterDefinition::new("SIDE", "Side to create the transects", ParameterKind::Enum)
    },
    ParameterDefinition::new("OUTPUT", "Transects", ParameterKind::LineSink),
];

fn definition(name: &str) -> Option<&'static ParameterDefinition> {
    PARAMETERS.iter().find(|parameter| parameter.name == name)
}

/// Validates `params` against the walk preconditions and the host bounds.
///
/// # Errors
/// Returns the first offending parameter.
pub fn check_parameters(params: &StationParameters) -> Result<(), ParameterError> {
    params.validate()?;
    for (name, value) in [
        ("DISTANCE", params.distance),
        ("LENGTH", params.length),
        ("ANGLE", params.angle_deg),
    ] {
        if let Some(parameter) = definition(name) {
            parameter.check(value)?;
        }
    }
    Ok(())
}

/// Input fields followed by the transect fields.
#[must_use]
pub fn output_fields(input: &Fields) -> Fields {
    let mut fields = input.clone();
    fields.append(Field::new(FIELD_SOURCE_ID, FieldType::Integer).with_length(20));
    fields.append(Field::new(FIELD_STATION, FieldType::Integer).with_length(20));
    fields.append(Field::new(FIELD_SEGMENT, FieldType::Integer).with_length(20));
    fields.append(
        Field::new(FIELD_ANGLE, FieldType::Double)
            .with_length(5)
            .with_precision(ANGLE_DECIMALS),
    );
    fields.append(
        Field::new(FIELD_LENGTH, FieldType::Double)
            .with_length(20)
            .with_precision(LENGTH_DECIMALS),
    );
    fields.append(Field::new(FIELD_ORIENT, FieldType::String).with_length(1));
    fields
}

#[allow(clippy::cast_possible_wrap)]
fn record_attributes(input: &[AttributeValue], record: &TransectRecord) -> Vec<AttributeValue> {
    let mut attributes = Vec::with_capacity(input.len() + 6);
    attributes.extend_from_slice(input);
    attributes.extend([
        AttributeValue::Integer(record.source_line_id as i64),
        AttributeValue::Integer(record.station_index as i64),
        AttributeValue::Integer(record.segment_index as i64),
        AttributeValue::Double(round_to(record.angle_deg, ANGLE_DECIMALS)),
        AttributeValue::Double(round_to(record.length, LENGTH_DECIMALS)),
        AttributeValue::Text(record.orientation().to_owned()),
    ]);
    attributes
}

#[allow(clippy::cast_possible_wrap)]
fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

fn write_record(
    sink: &mut dyn FeatureSink,
    feature: &Feature,
    record: &TransectRecord,
) -> Result<(), ProcessError> {
    if sink.add_feature(&record.geometry, record_attributes(&feature.attributes, record)) {
        Ok(())
    } else {
        Err(ProcessError::SinkWrite {
            source_line_id: record.source_line_id,
            station_index: record.station_index,
        })
    }
}

/// Builds every part of a feature before any of its stations is written.
fn feature_lines(feature: &Feature, source_line_id: usize) -> Result<Vec<Polyline2>, ProcessError> {
    let Some(geometry) = feature.geometry.as_ref() else {
        return Ok(Vec::new());
    };
    geometry
        .parts()
        .iter()
        .map(|part| {
            Polyline2::new(part.clone()).map_err(|source| ProcessError::DegenerateGeometry {
                source_line_id,
                source,
            })
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn progress_step(feature_count: usize) -> f64 {
    if feature_count > 0 {
        100.0 / feature_count as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StationLinesAlgorithm {
    params: StationParameters,
}

impl StationLinesAlgorithm {
    #[must_use]
    pub const fn new(params: StationParameters) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn id(&self) -> &'static str {
        ALGORITHM_ID
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        ALGORITHM_NAME
    }

    #[must_use]
    pub const fn parameter_definitions(&self) -> &'static [ParameterDefinition] {
        PARAMETERS
    }

    #[must_use]
    pub const fn params(&self) -> &StationParameters {
        &self.params
    }

    pub fn set_params(&mut self, params: StationParameters) {
        self.params = params;
    }

    #[must_use]
    pub const fn side(&self) -> Side {
        self.params.side
    }

    /// Runs the algorithm, writing every transect to `sink` as it is built.
    ///
    /// Cancellation is polled before each feature; output already written
    /// stays in the sink.
    ///
    /// # Errors
    /// Invalid parameters fail before the sink is prepared. A degenerate
    /// line or a rejected write aborts the run.
    #[allow(clippy::cast_precision_loss)]
    pub fn process(
        &self,
        source: &dyn FeatureSource,
        sink: &mut dyn FeatureSink,
        feedback: &mut dyn Feedback,
    ) -> Result<ProcessSummary, ProcessError> {
        check_parameters(&self.params)?;

        let fields = output_fields(source.fields());
        if !sink.prepare(&fields, source.crs()) {
            return Err(ProcessError::InvalidSink);
        }

        let step = progress_step(source.feature_count());
        let mut summary = ProcessSummary::default();
        let mut run_counter = 0;

        for (position, feature) in source.features().enumerate() {
            let current = position + 1;
            if feedback.is_canceled() {
                log::warn!("transect generation canceled before feature {current}");
                summary.canceled = true;
                break;
            }
            summary.features_read += 1;

            if !feature.has_geometry() {
                summary.features_skipped += 1;
                continue;
            }
            feedback.set_progress(current as f64 * step);

            let lines = feature_lines(&feature, current)?;
            let mut next = match self.params.numbering {
                StationNumbering::PerFeature => 0,
                StationNumbering::Continuous => run_counter,
            };
            let first = next;

            for line in &lines {
                let (stations, following) = generate_stations(line, &self.params, next, current)?;
                for record in stations {
                    write_record(sink, &feature, &record)?;
                    summary.transects_written += 1;
                }
                next = following;
            }

            log::debug!(
                "feature {current}: {} part(s), stations {first}..{next}",
                lines.len()
            );
            summary.parts += lines.len();
            run_counter = next;
        }

        log::info!(
            "wrote {} transect(s) from {} feature(s), {} without geometry",
            summary.transects_written,
            summary.features_read,
            summary.features_skipped
        );
        Ok(summary)
    }

    /// Same output as [`process`](Self::process), with the station walk of
    /// every feature computed on the rayon pool. Writes still happen in
    /// input order on the calling thread.
    ///
    /// # Errors
    /// Same as [`process`](Self::process). Features before a failing one
    /// are written first.
    #[cfg(feature = "parallel")]
    #[allow(clippy::cast_precision_loss)]
    pub fn process_parallel(
        &self,
        source: &dyn FeatureSource,
        sink: &mut dyn FeatureSink,
        feedback: &mut dyn Feedback,
    ) -> Result<ProcessSummary, ProcessError> {
        use rayon::prelude::*;

        use crate::transect::generate_feature_stations;

        check_parameters(&self.params)?;

        let fields = output_fields(source.fields());
        if !sink.prepare(&fields, source.crs()) {
            return Err(ProcessError::InvalidSink);
        }

        let mut summary = ProcessSummary::default();
        if feedback.is_canceled() {
            log::warn!("transect generation canceled before feature 1");
            summary.canceled = true;
            return Ok(summary);
        }

        let features: Vec<Feature> = source.features().collect();
        let step = progress_step(features.len());
        let params = self.params;
        let computed: Vec<Option<Result<Vec<TransectRecord>, ProcessError>>> = features
            .par_iter()
            .enumerate()
            .map(|(position, feature)| {
                let current = position + 1;
                let geometry = feature.geometry.as_ref()?;
                Some(
                    generate_feature_stations(geometry.parts(), &params, 0, current)
                        .map(|(records, _)| records)
                        .map_err(|err| match err {
                            TransectError::DegenerateLine(source) => {
                                ProcessError::DegenerateGeometry {
                                    source_line_id: current,
                                    source,
                                }
                            }
                            other => ProcessError::Transect(other),
                        }),
                )
            })
            .collect();

        let mut run_counter = 0;
        for (position, (feature, result)) in features.iter().zip(computed).enumerate() {
            let current = position + 1;
            if feedback.is_canceled() {
                log::warn!("transect generation canceled before feature {current}");
                summary.canceled = true;
                break;
            }
            summary.features_read += 1;

            let Some(result) = result else {
                summary.features_skipped += 1;
                continue;
            };
            feedback.set_progress(current as f64 * step);

            let records = result?;
            let offset = match params.numbering {
                StationNumbering::PerFeature => 0,
                StationNumbering::Continuous => run_counter,
            };
            for mut record in records.iter().copied() {
                record.station_index += offset;
                record.segment_index += offset;
                write_record(sink, feature, &record)?;
                summary.transects_written += 1;
            }
            run_counter = offset + records.len();
            summary.parts += feature.geometry.as_ref().map_or(0, |g| g.parts().len());
        }

        log::info!(
            "wrote {} transect(s) from {} feature(s) in parallel, {} without geometry",
            summary.transects_written,
            summary.features_read,
            summary.features_skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{MemorySink, MemorySource, NoFeedback};
    use crate::geom::Point2;

    fn line(points: &[(f64, f64)]) -> Vec<Point2> {
        points.iter().copied().map(Point2::from).collect()
    }

    #[test]
    fn test_output_fields_appends_transect_columns() {
        let input: Fields = [Field::new("name", FieldType::String)].into_iter().collect();
        let fields = output_fields(&input);
        assert_eq!(
            fields.names(),
            ["name", "TR_FID", "TR_ID", "TR_SEGMENT", "TR_ANGLE", "TR_LENGTH", "TR_ORIENT"]
        );
        let angle = fields.iter().find(|f| f.name == FIELD_ANGLE).unwrap();
        assert_eq!((angle.length, angle.precision), (5, 2));
        let orient = fields.iter().find(|f| f.name == FIELD_ORIENT).unwrap();
        assert_eq!((orient.kind, orient.length), (FieldType::String, 1));
    }

    #[test]
    fn test_check_parameters_enforces_host_minimum() {
        let err = check_parameters(&StationParameters::new(0.0005)).unwrap_err();
        assert!(matches!(err, ParameterError::OutOfRange { name: "DISTANCE", .. }));
        assert!(check_parameters(&StationParameters::new(0.001)).is_ok());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(90.12345, 2), 90.12);
        assert_eq!(round_to(5.000_000_4, 6), 5.0);
    }

    #[test]
    fn test_attributes_are_appended() {
        let source = MemorySource::new(
            [Field::new("name", FieldType::String)].into_iter().collect(),
            vec![
                Feature::line(line(&[(0.0, 0.0), (10.0, 0.0)]))
                    .with_attributes(vec![AttributeValue::from("dike")]),
            ],
        );
        let algorithm = StationLinesAlgorithm::new(
            StationParameters::new(10.0).with_side(Side::Left).with_angle(45.0),
        );
        let mut sink = MemorySink::new();
        let summary = algorithm.process(&source, &mut sink, &mut NoFeedback).unwrap();

        assert_eq!(summary.transects_written, 2);
        assert_eq!(
            sink.features[1].attributes,
            vec![
                AttributeValue::from("dike"),
                AttributeValue::Integer(1),
                AttributeValue::Integer(1),
                AttributeValue::Integer(2),
                AttributeValue::Double(45.0),
                AttributeValue::Double(5.0),
                AttributeValue::from("L"),
            ]
        );
    }

    #[test]
    fn test_invalid_parameters_do_not_touch_sink() {
        let source = MemorySource::new(
            Fields::new(),
            vec![Feature::line(line(&[(0.0, 0.0), (1.0, 0.0)]))],
        );
        let algorithm = StationLinesAlgorithm::new(StationParameters::new(-1.0));
        let mut sink = MemorySink::new();
        let result = algorithm.process(&source, &mut sink, &mut NoFeedback);
        assert!(matches!(result, Err(ProcessError::Parameters(_))));
        assert!(sink.fields.is_empty());
        assert!(sink.features.is_empty());
    }

    #[test]
    fn test_parameter_definitions_defaults() {
        let distance = definition("DISTANCE").unwrap();
        assert_eq!(distance.default, Some(50.0));
        assert_eq!(distance.min, Some(0.001));
        let side = definition("SIDE").unwrap();
        assert_eq!(side.options, ["Left", "Right", "Both"]);
        assert_eq!(Side::from_index(2), Some(Side::Both));
    }
}
