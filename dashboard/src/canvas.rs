use crate::projection::{grid_step, Viewport};
use crate::surface::CanvasSurface;
use geotrackcore::render::{
    render_popup, marker_label, ArrowLayer, Layer, LegendLayer, MarkerKind, MarkerLayer,
    PolylineLayer,
};
use iced::{
    mouse,
    widget::canvas::{self, Frame, Geometry, Path, Stroke, Text},
    Color, Pixels, Point, Rectangle, Renderer, Size, Theme,
};
use std::time::Instant;

const BACKGROUND: Color = Color {
    r: 0.92,
    g: 0.93,
    b: 0.90,
    a: 1.0,
};
const GRID: Color = Color {
    r: 0.80,
    g: 0.82,
    b: 0.80,
    a: 1.0,
};
const INK: Color = Color {
    r: 0.15,
    g: 0.16,
    b: 0.18,
    a: 1.0,
};
const MARKER_RADIUS: f32 = 7.0;
const HOVER_RADIUS: f32 = 10.0;

fn to_iced(color: geotrackcore::render::Color, alpha: f32) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, alpha)
}

/// Draws the layers held by a [`CanvasSurface`].
pub struct MapView<'a> {
    surface: &'a CanvasSurface,
    now: Instant,
}

impl<'a> MapView<'a> {
    pub fn new(surface: &'a CanvasSurface, now: Instant) -> Self {
        Self { surface, now }
    }
}

impl<Message> canvas::Program<Message> for MapView<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), BACKGROUND);

        if !self.surface.is_ready() {
            let message = if self.surface.is_released() {
                "Map released"
            } else {
                "Loading map..."
            };
            draw_label(&mut frame, message, Point::new(16.0, 16.0), INK, 16.0);
            return vec![frame.into_geometry()];
        }

        let viewport = self.surface.viewport_at(
            f64::from(bounds.width),
            f64::from(bounds.height),
            self.now,
        );
        draw_graticule(&mut frame, &viewport, bounds.size());

        let mut attribution = None;
        let mut legend = None;
        let mut markers: Vec<&MarkerLayer> = Vec::new();
        for (_, layer) in self.surface.layers() {
            match layer {
                Layer::Tiles(tiles) => attribution = Some(tiles.attribution.as_str()),
                Layer::Polyline(line) => draw_polyline(&mut frame, &viewport, line),
                Layer::Arrow(arrow) => draw_arrow(&mut frame, &viewport, arrow),
                Layer::Marker(marker) => markers.push(marker),
                Layer::Legend(entries) => legend = Some(entries),
            }
        }

        let mut hovered = None;
        let pointer = cursor.position_in(bounds);
        for marker in markers {
            let (x, y) = viewport.to_screen(marker.position);
            let at = Point::new(x as f32, y as f32);
            draw_marker(&mut frame, at, marker);
            if let Some(pointer) = pointer {
                if pointer.distance(at) <= HOVER_RADIUS {
                    hovered = Some((at, marker));
                }
            }
        }

        if let Some(legend) = legend {
            draw_legend(&mut frame, legend, bounds.size());
        }
        if let Some(text) = attribution {
            draw_label(
                &mut frame,
                text,
                Point::new(bounds.width - 170.0, bounds.height - 18.0),
                INK,
                11.0,
            );
        }
        if let Some((at, marker)) = hovered {
            draw_popup(&mut frame, at, marker, bounds.size());
        }

        vec![frame.into_geometry()]
    }
}

fn draw_label(frame: &mut Frame, content: &str, position: Point, color: Color, size: f32) {
    frame.fill_text(Text {
        content: content.to_string(),
        position,
        color,
        size: Pixels(size),
        ..Text::default()
    });
}

fn draw_graticule(frame: &mut Frame, viewport: &Viewport, size: Size) {
    let visible = viewport.visible_bounds();
    let lat_step = grid_step(visible.lat_span(), 6.0);
    let lng_step = grid_step(visible.lng_span(), 6.0);
    let stroke = Stroke::default().with_color(GRID).with_width(1.0);

    let mut lat = (visible.south_west.lat / lat_step).floor() * lat_step;
    while lat <= visible.north_east.lat {
        let (_, y) = viewport.to_screen(geotrackcore::LatLng::new(lat, viewport.center.lng));
        let line = Path::line(Point::new(0.0, y as f32), Point::new(size.width, y as f32));
        frame.stroke(&line, stroke);
        draw_label(frame, &format!("{lat:.3}°"), Point::new(4.0, y as f32 + 2.0), GRID, 10.0);
        lat += lat_step;
    }

    let mut lng = (visible.south_west.lng / lng_step).floor() * lng_step;
    while lng <= visible.north_east.lng {
        let (x, _) = viewport.to_screen(geotrackcore::LatLng::new(viewport.center.lat, lng));
        let line = Path::line(Point::new(x as f32, 0.0), Point::new(x as f32, size.height));
        frame.stroke(&line, stroke);
        lng += lng_step;
    }
}

fn draw_polyline(frame: &mut Frame, viewport: &Viewport, line: &PolylineLayer) {
    if line.vertices.len() < 2 {
        return;
    }
    let path = Path::new(|builder| {
        for (index, vertex) in line.vertices.iter().enumerate() {
            let (x, y) = viewport.to_screen(*vertex);
            let point = Point::new(x as f32, y as f32);
            if index == 0 {
                builder.move_to(point);
            } else {
                builder.line_to(point);
            }
        }
    });
    frame.stroke(
        &path,
        Stroke::default()
            .with_width(line.stroke.weight)
            .with_color(to_iced(line.stroke.color, line.stroke.opacity)),
    );
}

fn draw_arrow(frame: &mut Frame, viewport: &Viewport, arrow: &ArrowLayer) {
    let (x, y) = viewport.to_screen(arrow.position);
    let heading = arrow.bearing_deg.to_radians() as f32;
    // Bearings run clockwise from north; screen y grows downwards.
    let forward = (heading.sin(), -heading.cos());
    let side = (-forward.1, forward.0);
    let (x, y) = (x as f32, y as f32);
    let tip = Point::new(x + forward.0 * 7.0, y + forward.1 * 7.0);
    let left = Point::new(
        x - forward.0 * 5.0 + side.0 * 5.0,
        y - forward.1 * 5.0 + side.1 * 5.0,
    );
    let right = Point::new(
        x - forward.0 * 5.0 - side.0 * 5.0,
        y - forward.1 * 5.0 - side.1 * 5.0,
    );
    let path = Path::new(|builder| {
        builder.move_to(tip);
        builder.line_to(left);
        builder.line_to(right);
        builder.close();
    });
    frame.fill(&path, to_iced(arrow.color, 0.9));
}

fn draw_marker(frame: &mut Frame, at: Point, marker: &MarkerLayer) {
    let fill = to_iced(marker.color, 1.0);
    if marker.popup.kind == MarkerKind::Live {
        let halo = Path::circle(at, MARKER_RADIUS * 2.2);
        frame.fill(&halo, to_iced(marker.color, 0.25));
    }
    let dot = Path::circle(at, MARKER_RADIUS);
    frame.fill(&dot, fill);
    frame.stroke(&dot, Stroke::default().with_color(Color::WHITE).with_width(2.0));

    let badge = match marker.popup.kind {
        MarkerKind::Start => Some("S"),
        MarkerKind::End => Some("E"),
        MarkerKind::Live | MarkerKind::Waypoint => None,
    };
    if let Some(badge) = badge {
        draw_label(frame, badge, Point::new(at.x - 3.5, at.y - 6.0), Color::WHITE, 11.0);
    }
    if marker.popup.kind == MarkerKind::Live {
        draw_label(
            frame,
            &marker_label(&marker.popup),
            Point::new(at.x + 14.0, at.y - 7.0),
            INK,
            12.0,
        );
    }
}

fn draw_legend(frame: &mut Frame, legend: &LegendLayer, size: Size) {
    let row_height = 18.0;
    let width = 220.0;
    let height = 12.0 + row_height * legend.entries.len() as f32;
    let origin = Point::new(size.width - width - 12.0, 12.0);
    frame.fill_rectangle(
        origin,
        Size::new(width, height),
        Color::from_rgba(1.0, 1.0, 1.0, 0.88),
    );
    for (index, entry) in legend.entries.iter().enumerate() {
        let y = origin.y + 6.0 + row_height * index as f32;
        frame.fill_rectangle(
            Point::new(origin.x + 8.0, y + 4.0),
            Size::new(18.0, 4.0),
            to_iced(entry.color, 1.0),
        );
        draw_label(
            frame,
            &format!("{} ({})", entry.device_id, entry.owner),
            Point::new(origin.x + 32.0, y),
            INK,
            12.0,
        );
    }
}

fn draw_popup(frame: &mut Frame, at: Point, marker: &MarkerLayer, size: Size) {
    let content = render_popup(&marker.popup);
    let lines = content.lines().count().max(1) as f32;
    let box_size = Size::new(250.0, 10.0 + 16.0 * lines);
    let x = (at.x + 12.0).min(size.width - box_size.width - 4.0).max(4.0);
    let y = (at.y - box_size.height - 12.0).max(4.0);
    frame.fill_rectangle(Point::new(x, y), box_size, Color::from_rgba(1.0, 1.0, 1.0, 0.95));
    frame.stroke(
        &Path::rectangle(Point::new(x, y), box_size),
        Stroke::default().with_color(GRID).with_width(1.0),
    );
    draw_label(frame, &content, Point::new(x + 8.0, y + 5.0), INK, 13.0);
}
