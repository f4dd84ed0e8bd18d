//! Feature model shared by sources, sinks and the algorithm.
//!
//! Hosts plug in through three traits: [`FeatureSource`] yields input line
//! features, [`FeatureSink`] receives the 2-point output lines, and
//! [`Feedback`] carries cancellation and progress. In-memory
//! implementations are provided for tests and for the GeoJSON adapter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{Point2, Segment2};

/// An opaque attribute value passed through from input to output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Double,
    String,
    Boolean,
}

impl FieldType {
    /// Best matching type for a value; `None` for nulls.
    #[must_use]
    pub fn of(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Null => None,
            AttributeValue::Bool(_) => Some(Self::Boolean),
            AttributeValue::Integer(_) => Some(Self::Integer),
            AttributeValue::Double(_) => Some(Self::Double),
            AttributeValue::Text(_) => Some(Self::String),
        }
    }
}

/// Attribute table column. `length` and `precision` of 0 mean unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub length: u32,
    pub precision: u32,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            length: 0,
            precision: 0,
        }
    }

    #[must_use]
    pub const fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub const fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }
}

/// Ordered set of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, field: Field) {
        self.fields.push(field);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Coordinate reference system descriptor, carried unchanged from source to sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(serde_json::Value);

impl Crs {
    #[must_use]
    pub fn new(definition: serde_json::Value) -> Self {
        Self(definition)
    }

    /// Named CRS in the GeoJSON 2008 layout.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(serde_json::json!({ "type": "name", "properties": { "name": name } }))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.pointer("/properties/name")?.as_str()
    }

    #[must_use]
    pub fn definition(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Line geometry of an input feature.
#[derive(Debug, Clone, PartialEq)]
pub enum LineGeometry {
    Single(Vec<Point2>),
    Multi(Vec<Vec<Point2>>),
}

impl LineGeometry {
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// Parts in order; a single line is one part.
    #[must_use]
    pub fn parts(&self) -> &[Vec<Point2>] {
        match self {
            Self::Single(points) => std::slice::from_ref(points),
            Self::Multi(parts) => parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub attributes: Vec<AttributeValue>,
    pub geometry: Option<LineGeometry>,
}

impl Feature {
    #[must_use]
    pub fn new(geometry: Option<LineGeometry>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    #[must_use]
    pub fn line(points: Vec<Point2>) -> Self {
        Self::new(Some(LineGeometry::Single(points)), Vec::new())
    }

    #[must_use]
    pub fn multi_line(parts: Vec<Vec<Point2>>) -> Self {
        Self::new(Some(LineGeometry::Multi(parts)), Vec::new())
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }
}

/// Supplies input line features.
pub trait FeatureSource {
    fn fields(&self) -> &Fields;

    fn crs(&self) -> Option<&Crs>;

    fn feature_count(&self) -> usize;

    fn features(&self) -> Box<dyn Iterator<Item = Feature> + '_>;
}

/// Receives output features. Returning `false` aborts the run.
pub trait FeatureSink {
    /// Called once with the output schema before any feature is added.
    fn prepare(&mut self, _fields: &Fields, _crs: Option<&Crs>) -> bool {
        true
    }

    fn add_feature(&mut self, geometry: &Segment2, attributes: Vec<AttributeValue>) -> bool;
}

/// Cancellation and progress side channel.
pub trait Feedback {
    fn is_canceled(&self) -> bool {
        false
    }

    /// Percentage of features consumed, 0 to 100.
    fn set_progress(&mut self, _percent: f64) {}
}

/// Feedback that never cancels and ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {}

/// Source backed by a vector of features.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    fields: Fields,
    crs: Option<Crs>,
    features: Vec<Feature>,
}

impl MemorySource {
    #[must_use]
    pub fn new(fields: Fields, features: Vec<Feature>) -> Self {
        Self {
            fields,
            crs: None,
            features,
        }
    }

    #[must_use]
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }
}

impl FeatureSource for MemorySource {
    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn features(&self) -> Box<dyn Iterator<Item = Feature> + '_> {
        Box::new(self.features.iter().cloned())
    }
}

/// An output feature as stored by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFeature {
    pub geometry: Segment2,
    pub attributes: Vec<AttributeValue>,
}

/// Sink collecting everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub fields: Fields,
    pub crs: Option<Crs>,
    pub features: Vec<OutputFeature>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `field` in every collected feature.
    #[must_use]
    pub fn column(&self, field: &str) -> Vec<AttributeValue> {
        let Some(index) = self.fields.index_of(field) else {
            return Vec::new();
        };
        self.features
            .iter()
            .filter_map(|feature| feature.attributes.get(index).cloned())
            .collect()
    }
}

impl FeatureSink for MemorySink {
    fn prepare(&mut self, fields: &Fields, crs: Option<&Crs>) -> bool {
        self.fields = fields.clone();
        self.crs = crs.cloned();
        true
    }

    fn add_feature(&mut self, geometry: &Segment2, attributes: Vec<AttributeValue>) -> bool {
        self.features.push(OutputFeature {
            geometry: *geometry,
            attributes,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_untagged_json() {
        let values: Vec<AttributeValue> =
            serde_json::from_str(r#"[null, true, 3, 2.5, "river"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                AttributeValue::Null,
                AttributeValue::Bool(true),
                AttributeValue::Integer(3),
                AttributeValue::Double(2.5),
                AttributeValue::Text("river".to_owned()),
            ]
        );
    }

    #[test]
    fn test_single_geometry_is_one_part() {
        let geometry = LineGeometry::Single(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]);
        assert_eq!(geometry.parts().len(), 1);
        assert!(!geometry.is_multipart());
    }

    #[test]
    fn test_crs_name() {
        let crs = Crs::from_name("EPSG:2154");
        assert_eq!(crs.name(), Some("EPSG:2154"));
        assert_eq!(crs.to_string(), "EPSG:2154");
    }

    #[test]
    fn test_memory_sink_column() {
        let mut sink = MemorySink::new();
        let fields: Fields = [Field::new("id", FieldType::Integer)].into_iter().collect();
        assert!(sink.prepare(&fields, None));
        let segment = Segment2::new(Point2::ORIGIN, Point2::new(1.0, 1.0));
        assert!(sink.add_feature(&segment, vec![AttributeValue::from(4_i64)]));
        assert_eq!(sink.column("id"), vec![AttributeValue::Integer(4)]);
        assert!(sink.column("missing").is_empty());
    }
}
