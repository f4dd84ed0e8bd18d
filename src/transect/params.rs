use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geom::VertexAngle;

/// Default spacing between stations.
pub const DEFAULT_DISTANCE: f64 = 50.0;
/// Smallest spacing a host may configure.
pub const MIN_DISTANCE: f64 = 0.001;
/// Default transect length per side.
pub const DEFAULT_LENGTH: f64 = 5.0;
/// Default angle from the line, strict perpendicular.
pub const DEFAULT_ANGLE: f64 = 90.0;
/// Upper bound of the angle parameter.
pub const MAX_ANGLE: f64 = 360.0;

/// Errors for station parameters that would make the walk meaningless.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("station distance must be a finite number greater than 0, got {distance}")]
    InvalidDistance { distance: f64 },

    #[error("transect length must be a finite number of at least 0, got {length}")]
    InvalidLength { length: f64 },

    #[error("transect angle must be between 0 and 360 degrees, got {angle}")]
    InvalidAngle { angle: f64 },

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unknown side `{0}` (expected left, right or both)")]
    UnknownSide(String),

    #[error("unknown station numbering `{0}` (expected per-feature or continuous)")]
    UnknownNumbering(String),
}

/// Side(s) of the reference line a transect extends toward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    #[default]
    Both,
}

impl Side {
    /// Options in host enum order.
    pub const ALL: [Self; 3] = [Self::Left, Self::Right, Self::Both];

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Both => "Both",
        }
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        }
    }

    /// Single-letter orientation code written to the `TR_ORIENT` field.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
            Self::Both => "B",
        }
    }

    /// Position in [`Side::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Both => 2,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Side {
    type Err = ParameterError;

    /// Accepts the keyword, the orientation code or the enum index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|side| {
                key == side.keyword()
                    || key == side.code().to_lowercase()
                    || key == side.index().to_string()
            })
            .ok_or_else(|| ParameterError::UnknownSide(s.to_owned()))
    }
}

/// Whether station indices restart for every feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StationNumbering {
    /// Each feature numbers its stations from 0.
    #[default]
    PerFeature,
    /// One counter runs across every feature of the source.
    Continuous,
}

impl FromStr for StationNumbering {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "per-feature" | "feature" => Ok(Self::PerFeature),
            "continuous" | "global" => Ok(Self::Continuous),
            _ => Err(ParameterError::UnknownNumbering(s.to_owned())),
        }
    }
}

/// Options for walking a line and building transects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StationParameters {
    /// Arc-length spacing between stations.
    pub distance: f64,
    /// Transect extent per side. `Both` spans twice this value.
    pub length: f64,
    /// Offset from the local tangent in degrees; 90 is perpendicular.
    #[serde(rename = "angle")]
    pub angle_deg: f64,
    pub side: Side,
    pub vertex_angle: VertexAngle,
    pub numbering: StationNumbering,
}

impl StationParameters {
    /// Create parameters with the given spacing and default everything else.
    #[must_use]
    pub const fn new(distance: f64) -> Self {
        Self {
            distance,
            length: DEFAULT_LENGTH,
            angle_deg: DEFAULT_ANGLE,
            side: Side::Both,
            vertex_angle: VertexAngle::Bisector,
            numbering: StationNumbering::PerFeature,
        }
    }

    #[must_use]
    pub const fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub const fn with_angle(mut self, angle_deg: f64) -> Self {
        self.angle_deg = angle_deg;
        self
    }

    #[must_use]
    pub const fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub const fn with_vertex_angle(mut self, vertex_angle: VertexAngle) -> Self {
        self.vertex_angle = vertex_angle;
        self
    }

    #[must_use]
    pub const fn with_numbering(mut self, numbering: StationNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// Checks the preconditions of the station walk.
    ///
    /// # Errors
    /// Returns the first offending parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(ParameterError::InvalidDistance {
                distance: self.distance,
            });
        }
        if !(self.length.is_finite() && self.length >= 0.0) {
            return Err(ParameterError::InvalidLength {
                length: self.length,
            });
        }
        if !(self.angle_deg.is_finite() && (0.0..=MAX_ANGLE).contains(&self.angle_deg)) {
            return Err(ParameterError::InvalidAngle {
                angle: self.angle_deg,
            });
        }
        Ok(())
    }
}

impl Default for StationParameters {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE)
    }
}
