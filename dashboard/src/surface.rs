use crate::projection::{lerp, Viewport};
use geotrackcore::geo::Bounds;
use geotrackcore::render::{Layer, LayerId, MapSurface, PopupView, SurfaceError};
use geotrackcore::LatLng;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const PAN_DURATION: Duration = Duration::from_millis(450);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Camera {
    Centered { center: LatLng, zoom: f64 },
    Fitted(Bounds),
}

#[derive(Debug, Clone, Copy)]
struct PanAnimation {
    from: LatLng,
    started: Instant,
}

/// Map surface drawn by the dashboard canvas.
///
/// Layers are kept as plain data; the canvas reads them on every frame and
/// projects them through the current [`Camera`].
#[derive(Debug)]
pub struct CanvasSurface {
    prepared: bool,
    released: bool,
    next_id: u64,
    layers: BTreeMap<LayerId, Layer>,
    camera: Camera,
    zoom: f64,
    pan: Option<PanAnimation>,
    revision: u64,
}

impl CanvasSurface {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self {
            prepared: false,
            released: false,
            next_id: 0,
            layers: BTreeMap::new(),
            camera: Camera::Centered { center, zoom },
            zoom,
            pan: None,
            revision: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.prepared && !self.released
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// Bumped on every change so the canvas knows when to redraw.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &Layer)> {
        self.layers.iter()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.pan
            .map(|pan| now.saturating_duration_since(pan.started) < PAN_DURATION)
            .unwrap_or(false)
    }

    /// Viewport for a `width` x `height` canvas at time `now`.
    pub fn viewport_at(&self, width: f64, height: f64, now: Instant) -> Viewport {
        match self.camera {
            Camera::Fitted(bounds) => Viewport::fitting(bounds, width, height),
            Camera::Centered { center, zoom } => {
                let center = match self.pan {
                    Some(pan) => {
                        let elapsed = now.saturating_duration_since(pan.started);
                        let t = elapsed.as_secs_f64() / PAN_DURATION.as_secs_f64();
                        lerp(pan.from, center, ease_out(t))
                    }
                    None => center,
                };
                Viewport::new(center, zoom, width, height)
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), SurfaceError> {
        if self.released {
            return Err(SurfaceError::Released);
        }
        if !self.prepared {
            return Err(SurfaceError::NotReady("canvas not prepared".into()));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

fn ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

impl MapSurface for CanvasSurface {
    fn prepare(&mut self) -> Result<(), SurfaceError> {
        if self.released {
            return Err(SurfaceError::Released);
        }
        self.prepared = true;
        Ok(())
    }

    fn add_layer(&mut self, layer: Layer) -> Result<LayerId, SurfaceError> {
        self.ensure_ready()?;
        self.next_id += 1;
        let id = LayerId(self.next_id);
        self.layers.insert(id, layer);
        self.touch();
        Ok(id)
    }

    fn remove_layer(&mut self, id: LayerId) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        self.layers
            .remove(&id)
            .ok_or(SurfaceError::UnknownLayer(id))?;
        self.touch();
        Ok(())
    }

    fn update_marker(
        &mut self,
        id: LayerId,
        position: LatLng,
        popup: PopupView,
    ) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        match self.layers.get_mut(&id) {
            Some(Layer::Marker(marker)) => {
                marker.position = position;
                marker.popup = popup;
            }
            Some(_) => return Err(SurfaceError::NotAMarker(id)),
            None => return Err(SurfaceError::UnknownLayer(id)),
        }
        self.touch();
        Ok(())
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        self.zoom = f64::from(zoom);
        self.camera = Camera::Centered {
            center,
            zoom: self.zoom,
        };
        self.pan = None;
        self.touch();
        Ok(())
    }

    fn pan_to(&mut self, center: LatLng) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        let now = Instant::now();
        let from = match self.camera {
            Camera::Centered { .. } => self.viewport_at(1.0, 1.0, now).center,
            Camera::Fitted(bounds) => bounds.center(),
        };
        self.camera = Camera::Centered {
            center,
            zoom: self.zoom,
        };
        self.pan = Some(PanAnimation { from, started: now });
        self.touch();
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError> {
        self.ensure_ready()?;
        self.camera = Camera::Fitted(bounds);
        self.pan = None;
        self.touch();
        Ok(())
    }

    fn release(&mut self) {
        self.layers.clear();
        self.pan = None;
        self.released = true;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geotrackcore::model::GeoPoint;
    use geotrackcore::render::{
        EngineConfig, MarkerKind, MarkerLayer, MountOutcome, RenderEngine, LIVE_MARKER_COLOR,
    };
    use geotrackcore::ViewMode;

    fn origin() -> LatLng {
        LatLng::new(9.9281, -84.0907)
    }

    fn popup() -> PopupView {
        let point = GeoPoint::new(
            "ana@example.com",
            "ana-phone",
            9.93,
            -84.09,
            Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
        );
        PopupView::for_point(MarkerKind::Live, &point)
    }

    fn marker() -> Layer {
        Layer::Marker(MarkerLayer {
            position: origin(),
            color: LIVE_MARKER_COLOR,
            popup: popup(),
        })
    }

    #[test]
    fn layers_need_a_prepared_surface() {
        let mut surface = CanvasSurface::new(origin(), 10.0);
        assert!(matches!(
            surface.add_layer(marker()),
            Err(SurfaceError::NotReady(_))
        ));
        surface.prepare().unwrap();
        let id = surface.add_layer(marker()).unwrap();
        assert!(surface.layer(id).is_some());

        surface.release();
        assert_eq!(surface.add_layer(marker()), Err(SurfaceError::Released));
        assert_eq!(surface.prepare(), Err(SurfaceError::Released));
        assert_eq!(surface.layers().count(), 0);
    }

    #[test]
    fn marker_updates_check_the_layer_kind() {
        let mut surface = CanvasSurface::new(origin(), 10.0);
        surface.prepare().unwrap();
        let id = surface.add_layer(marker()).unwrap();
        let moved = LatLng::new(9.95, -84.0);
        surface.update_marker(id, moved, popup()).unwrap();
        match surface.layer(id) {
            Some(Layer::Marker(marker)) => assert_eq!(marker.position, moved),
            other => panic!("unexpected layer {other:?}"),
        }

        surface.remove_layer(id).unwrap();
        assert_eq!(
            surface.update_marker(id, moved, popup()),
            Err(SurfaceError::UnknownLayer(id))
        );
        assert_eq!(surface.remove_layer(id), Err(SurfaceError::UnknownLayer(id)));
    }

    #[test]
    fn pan_animates_towards_the_target() {
        let mut surface = CanvasSurface::new(LatLng::new(0.0, 0.0), 10.0);
        surface.prepare().unwrap();
        let target = LatLng::new(1.0, 1.0);
        surface.pan_to(target).unwrap();

        let start = surface.viewport_at(800.0, 600.0, Instant::now());
        assert!(start.center.lat < 0.9);
        let later = Instant::now() + Duration::from_secs(2);
        assert!(!surface.is_animating(later));
        let end = surface.viewport_at(800.0, 600.0, later);
        assert!((end.center.lat - 1.0).abs() < 1e-9);
        assert_eq!(end.zoom, 10.0);
    }

    #[test]
    fn engine_draws_trails_onto_the_canvas_surface() {
        let mut engine = RenderEngine::new(CanvasSurface::new(origin(), 10.0), EngineConfig::default());
        assert_eq!(engine.mount().unwrap(), MountOutcome::Initialized);
        let t0 = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let points: Vec<GeoPoint> = (0..4)
            .map(|i| {
                GeoPoint::new(
                    "ana@example.com",
                    "ana-phone",
                    9.93 + i as f64 * 0.001,
                    -84.09,
                    t0 + chrono::Duration::minutes(i),
                )
            })
            .collect();
        let report = engine.update(&points, ViewMode::Historical).unwrap();
        assert_eq!(report.polylines, 1);
        assert!(matches!(engine.surface().camera(), Camera::Fitted(_)));
        let polylines = engine
            .surface()
            .layers()
            .filter(|(_, layer)| matches!(layer, Layer::Polyline(_)))
            .count();
        assert_eq!(polylines, 1);
    }
}
