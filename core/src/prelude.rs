use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::control::{
    Authenticator, CollaboratorError, ControllerConfig, CooperativeScheduler, FetchRequest,
    FetchTicket, LocationStore, Scheduler, ViewModeController,
};
pub use crate::model::{GeoPoint, LocationReport, User};
pub use crate::render::{EngineConfig, MapSurface, RenderEngine, StylePreset};

/// Which fetch cadence feeds the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Full recent window drawn as per-device trails.
    #[default]
    Historical,
    /// Single latest point, refreshed on a fixed interval.
    Live,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Historical => ViewMode::Live,
            ViewMode::Live => ViewMode::Historical,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Historical => "historical",
            ViewMode::Live => "live",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Geographic coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        crate::geo::is_valid_coordinate(self.lat, self.lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Errors returned by render-engine operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("render engine has been destroyed")]
    Destroyed,
}

pub type EngineResult<T> = Result<T, EngineError>;
