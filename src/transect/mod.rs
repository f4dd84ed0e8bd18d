//! Transect generation along polylines.
//!
//! [`generate_stations`] walks one part; [`generate_feature_stations`]
//! threads the station counter over all parts of a feature.

mod generator;
mod params;
mod record;

pub use generator::{
    MAX_STATIONS, Stations, TransectError, calc_transect, generate_feature_stations,
    generate_stations, station_count,
};
pub use params::{
    DEFAULT_ANGLE, DEFAULT_DISTANCE, DEFAULT_LENGTH, MAX_ANGLE, MIN_DISTANCE, ParameterError,
    Side, StationNumbering, StationParameters,
};
pub use record::TransectRecord;
