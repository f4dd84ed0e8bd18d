//! Input/output adapters.

pub mod geojson;

pub use geojson::{GeoJsonError, GeoJsonSink, read_feature_collection};
