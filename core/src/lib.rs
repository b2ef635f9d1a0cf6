//! Core location model, map render engine and view-mode controller for GeoTrack.
//!
//! The engine owns one map surface and keeps its layers in step with the
//! latest batch of points; the controller decides which fetch feeds it and
//! owns the polling timer. Neither depends on a concrete UI toolkit.

pub mod control;
pub mod geo;
pub mod model;
pub mod prelude;
pub mod render;
pub mod telemetry;

pub use prelude::{EngineError, LatLng, ViewMode};
