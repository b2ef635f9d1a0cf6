use crate::geo::Bounds;
use crate::prelude::LatLng;
use crate::render::popup::PopupView;
use crate::render::style::{Color, StrokeStyle};
use std::fmt;

/// Handle to a layer attached to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Base map tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayer {
    pub position: LatLng,
    pub color: Color,
    pub popup: PopupView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineLayer {
    pub device_id: String,
    pub vertices: Vec<LatLng>,
    pub stroke: StrokeStyle,
}

/// Direction indicator drawn on a trail segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrowLayer {
    pub position: LatLng,
    pub bearing_deg: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub device_id: String,
    pub owner: String,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendLayer {
    pub entries: Vec<LegendEntry>,
}

/// Everything the engine can put on a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Tiles(TileLayer),
    Marker(MarkerLayer),
    Polyline(PolylineLayer),
    Arrow(ArrowLayer),
    Legend(LegendLayer),
}

impl Layer {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Layer::Tiles(_) => "tiles",
            Layer::Marker(_) => "marker",
            Layer::Polyline(_) => "polyline",
            Layer::Arrow(_) => "arrow",
            Layer::Legend(_) => "legend",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface is not ready: {0}")]
    NotReady(String),
    #[error("surface has been released")]
    Released,
    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),
    #[error("{0} is not a marker")]
    NotAMarker(LayerId),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Drawing backend owned by a [`crate::render::RenderEngine`].
///
/// Implementations hold the layer set and viewport. Every call may fail
/// independently; the engine logs the failure and carries on with the batch.
pub trait MapSurface {
    /// Makes the surface ready to accept layers. Called before the base tiles
    /// are attached and retried on the next mount if it fails.
    fn prepare(&mut self) -> Result<(), SurfaceError>;

    fn add_layer(&mut self, layer: Layer) -> Result<LayerId, SurfaceError>;

    fn remove_layer(&mut self, id: LayerId) -> Result<(), SurfaceError>;

    /// Moves an existing marker and replaces its popup without recreating it.
    fn update_marker(
        &mut self,
        id: LayerId,
        position: LatLng,
        popup: PopupView,
    ) -> Result<(), SurfaceError>;

    /// Jumps to `center` at `zoom` without animation.
    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<(), SurfaceError>;

    /// Animates the viewport to `center`, keeping the zoom.
    fn pan_to(&mut self, center: LatLng) -> Result<(), SurfaceError>;

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError>;

    /// Drops every layer and the underlying surface. Further calls fail with
    /// [`SurfaceError::Released`].
    fn release(&mut self);
}
