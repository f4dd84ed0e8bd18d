//! GeoJSON adapter.
//!
//! Reads a `FeatureCollection` of `LineString` / `MultiLineString` features
//! into a [`MemorySource`] and writes transects back out through
//! [`GeoJsonSink`]. Property order is preserved; the field list is the
//! union of all property names in order of first appearance, typed by the
//! first non-null value. A top-level `crs` member is carried through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::feature::{
    AttributeValue, Crs, Feature, FeatureSink, Field, FieldType, Fields, LineGeometry,
    MemorySource,
};
use crate::geom::{Point2, Segment2};

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a FeatureCollection, found `{0}`")]
    NotFeatureCollection(String),

    #[error("feature {index}: unsupported geometry type `{kind}` (expected LineString or MultiLineString)")]
    UnsupportedGeometry { index: usize, kind: String },

    #[error("feature {index}: malformed coordinates")]
    MalformedCoordinates { index: usize },

    #[error("could not write GeoJSON: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    crs: Option<Value>,
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// Parses a FeatureCollection into an in-memory source.
///
/// # Errors
/// Fails on invalid JSON, a non-collection root, non-line geometries or
/// malformed coordinates.
pub fn read_feature_collection(input: &str) -> Result<MemorySource, GeoJsonError> {
    let collection: RawCollection = serde_json::from_str(input)?;
    if collection.kind != "FeatureCollection" {
        return Err(GeoJsonError::NotFeatureCollection(collection.kind));
    }
    log::debug!("read {} GeoJSON feature(s)", collection.features.len());

    let fields = infer_fields(&collection.features);
    let features = collection
        .features
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let geometry = raw
                .geometry
                .as_ref()
                .filter(|value| !value.is_null())
                .map(|value| parse_geometry(index, value))
                .transpose()?;
            let attributes = fields
                .iter()
                .map(|field| {
                    raw.properties
                        .as_ref()
                        .and_then(|properties| properties.get(&field.name))
                        .map_or(AttributeValue::Null, json_to_attribute)
                })
                .collect();
            Ok(Feature::new(geometry, attributes))
        })
        .collect::<Result<Vec<_>, GeoJsonError>>()?;

    Ok(MemorySource::new(fields, features).with_crs(collection.crs.map(Crs::new)))
}

fn infer_fields(features: &[RawFeature]) -> Fields {
    let mut fields: Vec<Field> = Vec::new();
    let mut typed: Vec<bool> = Vec::new();

    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for (name, value) in properties {
            let index = match fields.iter().position(|field| &field.name == name) {
                Some(index) => index,
                None => {
                    fields.push(Field::new(name.clone(), FieldType::String));
                    typed.push(false);
                    fields.len() - 1
                }
            };
            let Some(kind) = FieldType::of(&json_to_attribute(value)) else {
                continue;
            };
            if !typed[index] {
                fields[index].kind = kind;
                typed[index] = true;
            } else if fields[index].kind == FieldType::Integer && kind == FieldType::Double {
                fields[index].kind = FieldType::Double;
            }
        }
    }

    fields.into_iter().collect()
}

fn parse_geometry(index: usize, value: &Value) -> Result<LineGeometry, GeoJsonError> {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    let coordinates = value.get("coordinates");
    match kind {
        "LineString" => Ok(LineGeometry::Single(parse_line(index, coordinates)?)),
        "MultiLineString" => {
            let parts = coordinates
                .and_then(Value::as_array)
                .ok_or(GeoJsonError::MalformedCoordinates { index })?
                .iter()
                .map(|part| parse_line(index, Some(part)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LineGeometry::Multi(parts))
        }
        other => Err(GeoJsonError::UnsupportedGeometry {
            index,
            kind: other.to_owned(),
        }),
    }
}

/// Positions may carry a third ordinate, which is dropped.
fn parse_line(index: usize, coordinates: Option<&Value>) -> Result<Vec<Point2>, GeoJsonError> {
    let malformed = || GeoJsonError::MalformedCoordinates { index };
    coordinates
        .and_then(Value::as_array)
        .ok_or_else(malformed)?
        .iter()
        .map(|position| {
            let ordinates = position.as_array().ok_or_else(malformed)?;
            match (
                ordinates.first().and_then(Value::as_f64),
                ordinates.get(1).and_then(Value::as_f64),
            ) {
                (Some(x), Some(y)) => Ok(Point2::new(x, y)),
                _ => Err(malformed()),
            }
        })
        .collect()
}

fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| AttributeValue::Double(n.as_f64().unwrap_or(f64::NAN)), AttributeValue::Integer),
        Value::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Integer(i) => Value::from(*i),
        AttributeValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        AttributeValue::Text(s) => Value::String(s.clone()),
    }
}

#[derive(Debug, Serialize)]
struct OutputLine {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [Point2; 2],
}

#[derive(Debug, Serialize)]
struct OutputFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: OutputLine,
    properties: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct OutputCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    crs: Option<&'a Crs>,
    features: &'a [OutputFeature],
}

/// Sink rendering a FeatureCollection of 2-point `LineString`s.
#[derive(Debug, Default)]
pub struct GeoJsonSink {
    fields: Fields,
    crs: Option<Crs>,
    features: Vec<OutputFeature>,
}

impl GeoJsonSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[must_use]
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn collection(&self) -> OutputCollection<'_> {
        OutputCollection {
            kind: "FeatureCollection",
            crs: self.crs.as_ref(),
            features: &self.features,
        }
    }

    /// # Errors
    /// Propagates serialization failures.
    pub fn to_geojson_string(&self) -> Result<String, GeoJsonError> {
        Ok(serde_json::to_string(&self.collection())?)
    }

    /// # Errors
    /// Propagates serialization and I/O failures.
    pub fn write_to<W: std::io::Write>(&self, mut writer: W) -> Result<(), GeoJsonError> {
        serde_json::to_writer_pretty(&mut writer, &self.collection())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl FeatureSink for GeoJsonSink {
    fn prepare(&mut self, fields: &Fields, crs: Option<&Crs>) -> bool {
        self.fields = fields.clone();
        self.crs = crs.cloned();
        self.features.clear();
        true
    }

    fn add_feature(&mut self, geometry: &Segment2, attributes: Vec<AttributeValue>) -> bool {
        if attributes.len() != self.fields.len() {
            log::error!(
                "feature has {} attribute(s) but the schema has {} field(s)",
                attributes.len(),
                self.fields.len()
            );
            return false;
        }

        let properties = self
            .fields
            .iter()
            .zip(&attributes)
            .map(|(field, value)| (field.name.clone(), attribute_to_json(value)))
            .collect();
        self.features.push(OutputFeature {
            kind: "Feature",
            geometry: OutputLine {
                kind: "LineString",
                coordinates: geometry.points(),
            },
            properties,
        });
        true
    }
}
