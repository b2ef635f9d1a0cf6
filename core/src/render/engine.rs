use crate::geo::{newest_valid, partition_by_device, Bounds};
use crate::model::GeoPoint;
use crate::prelude::{EngineError, EngineResult, LatLng, ViewMode};
use crate::render::popup::{MarkerKind, PopupView};
use crate::render::style::{palette_color, Color, StylePreset, LIVE_MARKER_COLOR};
use crate::render::surface::{
    ArrowLayer, Layer, LayerId, LegendEntry, LegendLayer, MapSurface, MarkerLayer,
    PolylineLayer, SurfaceError, TileLayer,
};
use crate::telemetry::{LogManager, MetricsRecorder};
use serde::{Deserialize, Serialize};

/// Tunables for the render engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tile_url: String,
    pub attribution: String,
    pub fallback_center: LatLng,
    pub fallback_zoom: u8,
    /// Zoom used when the live marker is first placed.
    pub live_zoom: u8,
    /// Draw a direction arrow on every n-th trail segment.
    pub arrow_stride: usize,
    /// Fraction of the data span added around fitted bounds.
    pub fit_padding: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
            attribution: "© OpenStreetMap contributors".into(),
            fallback_center: LatLng::new(9.9281, -84.0907),
            fallback_zoom: 10,
            live_zoom: 16,
            arrow_stride: 3,
            fit_padding: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Rendering,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Initialized,
    AlreadyInitialized,
    /// The surface could not be prepared; the engine stays uninitialized and
    /// mounting may be retried.
    Unavailable,
}

/// What one render pass did to the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub markers: usize,
    pub polylines: usize,
    pub arrows: usize,
    pub legend_entries: usize,
    pub removed: usize,
    pub failures: usize,
    /// The data was stored but not drawn because the surface is not mounted.
    pub deferred: bool,
}

/// Owns one map surface and keeps its layers in step with the latest points.
///
/// Live mode moves a single marker in place; historical mode clears and
/// redraws every trail. Layer failures are logged and counted, never
/// propagated, so a pass always draws as much as it can.
pub struct RenderEngine<S: MapSurface> {
    surface: S,
    config: EngineConfig,
    state: EngineState,
    init_error: Option<String>,
    mode: ViewMode,
    style: StylePreset,
    points: Vec<GeoPoint>,
    dirty: bool,
    tile_layer: Option<LayerId>,
    trail_layers: Vec<LayerId>,
    live_marker: Option<LayerId>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl<S: MapSurface> RenderEngine<S> {
    pub fn new(surface: S, config: EngineConfig) -> Self {
        Self {
            surface,
            config,
            state: EngineState::Uninitialized,
            init_error: None,
            mode: ViewMode::default(),
            style: StylePreset::default(),
            points: Vec::new(),
            dirty: false,
            tile_layer: None,
            trail_layers: Vec::new(),
            live_marker: None,
            logger: LogManager::new("geotrack::render"),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn style(&self) -> StylePreset {
        self.style
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn live_marker(&self) -> Option<LayerId> {
        self.live_marker
    }

    pub fn trail_layer_count(&self) -> usize {
        self.trail_layers.len()
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// User-facing notice while the map cannot be shown.
    pub fn notice(&self) -> Option<&'static str> {
        match self.state {
            EngineState::Uninitialized if self.init_error.is_some() => Some("Map could not load"),
            EngineState::Uninitialized => Some("Loading map..."),
            _ => None,
        }
    }

    /// Prepares the surface, attaches the base tiles and centres the fallback
    /// view. Calling it again once initialized does nothing.
    pub fn mount(&mut self) -> EngineResult<MountOutcome> {
        match self.state {
            EngineState::Destroyed => return Err(EngineError::Destroyed),
            EngineState::Initialized | EngineState::Rendering => {
                self.logger.trace_step("mount ignored: surface already initialized");
                return Ok(MountOutcome::AlreadyInitialized);
            }
            EngineState::Uninitialized => {}
        }

        if let Err(err) = self.surface.prepare() {
            return Ok(self.mount_failed(format!("surface not ready: {err}")));
        }

        if self.tile_layer.is_none() {
            let tiles = Layer::Tiles(TileLayer {
                url_template: self.config.tile_url.clone(),
                attribution: self.config.attribution.clone(),
            });
            match self.surface.add_layer(tiles) {
                Ok(id) => self.tile_layer = Some(id),
                Err(err) => return Ok(self.mount_failed(format!("base tiles failed: {err}"))),
            }
        }

        let mut report = RenderReport::default();
        if let Err(err) = self
            .surface
            .set_view(self.config.fallback_center, self.config.fallback_zoom)
        {
            self.note_failure("centre fallback view", &err, &mut report);
        }

        self.state = EngineState::Initialized;
        self.init_error = None;
        self.logger.record("map surface initialized");

        if self.dirty {
            self.render();
        }
        Ok(MountOutcome::Initialized)
    }

    /// Replaces the data set and redraws it for `mode`.
    ///
    /// Before mount the data is kept and drawn as soon as mounting succeeds.
    pub fn update(&mut self, points: &[GeoPoint], mode: ViewMode) -> EngineResult<RenderReport> {
        if self.state == EngineState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        self.points = points.to_vec();
        self.mode = mode;

        if self.state != EngineState::Initialized {
            self.dirty = true;
            return Ok(RenderReport {
                deferred: true,
                ..Default::default()
            });
        }
        Ok(self.render())
    }

    /// Switches the trail style and redraws the loaded trails without a fetch.
    pub fn set_style(&mut self, preset: StylePreset) -> EngineResult<RenderReport> {
        if self.state == EngineState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        self.style = preset;
        if self.state == EngineState::Initialized && self.mode == ViewMode::Historical {
            Ok(self.render())
        } else {
            Ok(RenderReport::default())
        }
    }

    /// Releases the surface and every layer. The engine accepts no further updates.
    pub fn destroy(&mut self) {
        if self.state == EngineState::Destroyed {
            return;
        }
        self.trail_layers.clear();
        self.live_marker = None;
        self.tile_layer = None;
        self.points.clear();
        self.surface.release();
        self.state = EngineState::Destroyed;
        self.logger.record("map surface released");
    }

    fn mount_failed(&mut self, reason: String) -> MountOutcome {
        self.logger.failure(&format!("map initialization failed: {reason}"));
        self.init_error = Some(reason);
        MountOutcome::Unavailable
    }

    fn render(&mut self) -> RenderReport {
        self.state = EngineState::Rendering;
        self.dirty = false;
        let mut report = RenderReport::default();

        match self.mode {
            ViewMode::Live => {
                self.clear_trails(&mut report);
                self.render_live(&mut report);
            }
            ViewMode::Historical => {
                self.drop_live_marker(&mut report);
                self.render_historical(&mut report);
            }
        }

        self.state = EngineState::Initialized;
        self.metrics.record_render();
        report
    }

    fn render_live(&mut self, report: &mut RenderReport) {
        let Some(point) = newest_valid(&self.points).cloned() else {
            self.logger
                .trace_step("live update skipped: no point with valid coordinates");
            return;
        };
        let position = point.position();
        let popup = PopupView::for_point(MarkerKind::Live, &point);

        if let Some(id) = self.live_marker {
            match self.surface.update_marker(id, position, popup.clone()) {
                Ok(()) => {
                    report.markers += 1;
                    if let Err(err) = self.surface.pan_to(position) {
                        self.note_failure("pan to live point", &err, report);
                    }
                    return;
                }
                Err(err @ (SurfaceError::UnknownLayer(_) | SurfaceError::NotAMarker(_))) => {
                    self.logger
                        .degraded(&format!("live marker lost ({err}), placing a new one"));
                    self.live_marker = None;
                }
                Err(err) => {
                    self.note_failure("move live marker", &err, report);
                    return;
                }
            }
        }

        let marker = Layer::Marker(MarkerLayer {
            position,
            color: LIVE_MARKER_COLOR,
            popup,
        });
        match self.surface.add_layer(marker) {
            Ok(id) => {
                self.live_marker = Some(id);
                report.markers += 1;
                if let Err(err) = self.surface.set_view(position, self.config.live_zoom) {
                    self.note_failure("snap to live point", &err, report);
                }
            }
            Err(err) => self.note_failure("add live marker", &err, report),
        }
    }

    fn render_historical(&mut self, report: &mut RenderReport) {
        self.clear_trails(report);

        let trails = partition_by_device(&self.points);
        let mut drawn: Vec<LatLng> = Vec::new();
        let mut legend = Vec::with_capacity(trails.len());

        for (index, trail) in trails.iter().enumerate() {
            let color = palette_color(index);
            let stroke = self.style.stroke(color);
            legend.push(LegendEntry {
                device_id: trail.device_id.clone(),
                owner: trail.owner.clone(),
                color,
            });

            if trail.is_route() {
                let vertices = trail.vertices();
                let line = Layer::Polyline(PolylineLayer {
                    device_id: trail.device_id.clone(),
                    vertices: vertices.clone(),
                    stroke,
                });
                if self.add_trail_layer(line, report) {
                    report.polylines += 1;
                }
                for arrow in trail.arrows(self.config.arrow_stride) {
                    let layer = Layer::Arrow(ArrowLayer {
                        position: arrow.position,
                        bearing_deg: arrow.bearing_deg,
                        color: stroke.color,
                    });
                    if self.add_trail_layer(layer, report) {
                        report.arrows += 1;
                    }
                }
                if let Some(start) = trail.start() {
                    self.add_marker(MarkerKind::Start, start, color, report);
                }
                if let Some(end) = trail.end() {
                    self.add_marker(MarkerKind::End, end, color, report);
                }
                drawn.extend(vertices);
            } else if let Some(point) = trail.start() {
                self.add_marker(MarkerKind::Waypoint, point, color, report);
                drawn.push(point.position());
            }
        }

        if let Some(bounds) = Bounds::from_positions(drawn) {
            if let Err(err) = self.surface.fit_bounds(bounds.pad(self.config.fit_padding)) {
                self.note_failure("fit trails into view", &err, report);
            }
        }

        if trails.len() > 1 {
            let entries = legend.len();
            if self.add_trail_layer(Layer::Legend(LegendLayer { entries: legend }), report) {
                report.legend_entries = entries;
            }
        }

        self.logger.trace_step(&format!(
            "historical redraw: {} devices, {} polylines, {} markers, {} failures",
            trails.len(),
            report.polylines,
            report.markers,
            report.failures
        ));
    }

    fn add_marker(
        &mut self,
        kind: MarkerKind,
        point: &GeoPoint,
        color: Color,
        report: &mut RenderReport,
    ) {
        let layer = Layer::Marker(MarkerLayer {
            position: point.position(),
            color,
            popup: PopupView::for_point(kind, point),
        });
        if self.add_trail_layer(layer, report) {
            report.markers += 1;
        }
    }

    fn add_trail_layer(&mut self, layer: Layer, report: &mut RenderReport) -> bool {
        let kind = layer.kind_name();
        match self.surface.add_layer(layer) {
            Ok(id) => {
                self.trail_layers.push(id);
                true
            }
            Err(err) => {
                self.note_failure(&format!("add {kind} layer"), &err, report);
                false
            }
        }
    }

    fn clear_trails(&mut self, report: &mut RenderReport) {
        for id in std::mem::take(&mut self.trail_layers) {
            match self.surface.remove_layer(id) {
                Ok(()) => report.removed += 1,
                Err(err) => self.note_failure(&format!("remove {id}"), &err, report),
            }
        }
    }

    fn drop_live_marker(&mut self, report: &mut RenderReport) {
        if let Some(id) = self.live_marker.take() {
            match self.surface.remove_layer(id) {
                Ok(()) => report.removed += 1,
                Err(err) => self.note_failure("remove live marker", &err, report),
            }
        }
    }

    fn note_failure(&self, action: &str, err: &SurfaceError, report: &mut RenderReport) {
        self.logger.degraded(&format!("{action} failed: {err}"));
        self.metrics.record_layer_failure();
        report.failures += 1;
    }
}

impl<S: MapSurface> Drop for RenderEngine<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}
