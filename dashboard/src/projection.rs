use geotrackcore::geo::Bounds;
use geotrackcore::LatLng;

/// Edge of one Web Mercator tile in pixels.
pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 18.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

/// Position in world pixels at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

pub fn project(position: LatLng, zoom: f64) -> WorldPoint {
    let size = world_size(zoom);
    let lat = position.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (position.lng + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * size;
    WorldPoint { x, y }
}

pub fn unproject(point: WorldPoint, zoom: f64) -> LatLng {
    let size = world_size(zoom);
    let lng = point.x / size * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * point.y / size);
    let lat = n.sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

/// Maps geographic positions onto a viewport of `width` x `height` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    /// Centres `bounds` and picks the largest zoom that keeps it on screen.
    pub fn fitting(bounds: Bounds, width: f64, height: f64) -> Self {
        let sw = project(bounds.south_west, 0.0);
        let ne = project(bounds.north_east, 0.0);
        let span_x = (ne.x - sw.x).abs().max(f64::EPSILON);
        let span_y = (sw.y - ne.y).abs().max(f64::EPSILON);
        let zoom = (width / span_x).log2().min((height / span_y).log2());
        Self::new(bounds.center(), zoom, width, height)
    }

    /// Screen coordinates of `position`, origin at the top-left corner.
    pub fn to_screen(&self, position: LatLng) -> (f64, f64) {
        let origin = project(self.center, self.zoom);
        let point = project(position, self.zoom);
        (
            point.x - origin.x + self.width / 2.0,
            point.y - origin.y + self.height / 2.0,
        )
    }

    pub fn to_geo(&self, x: f64, y: f64) -> LatLng {
        let origin = project(self.center, self.zoom);
        unproject(
            WorldPoint {
                x: origin.x + x - self.width / 2.0,
                y: origin.y + y - self.height / 2.0,
            },
            self.zoom,
        )
    }

    /// Geographic rectangle currently on screen.
    pub fn visible_bounds(&self) -> Bounds {
        let north_west = self.to_geo(0.0, 0.0);
        let south_east = self.to_geo(self.width, self.height);
        Bounds {
            south_west: LatLng::new(south_east.lat, north_west.lng),
            north_east: LatLng::new(north_west.lat, south_east.lng),
        }
    }
}

/// Spacing in degrees for grid lines so roughly `target` lines cross `span`.
pub fn grid_step(span: f64, target: f64) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let raw = span / target.max(1.0);
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let nice = if normalized < 1.5 {
        1.0
    } else if normalized < 3.5 {
        2.0
    } else if normalized < 7.5 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Linear interpolation between two positions, `t` clamped to [0, 1].
pub fn lerp(from: LatLng, to: LatLng, t: f64) -> LatLng {
    let t = t.clamp(0.0, 1.0);
    LatLng::new(
        from.lat + (to.lat - from.lat) * t,
        from.lng + (to.lng - from.lng) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn projection_round_trips_near_costa_rica() {
        let position = LatLng::new(9.9281, -84.0907);
        let back = unproject(project(position, 12.0), 12.0);
        assert!(close(back.lat, position.lat, 1e-9));
        assert!(close(back.lng, position.lng, 1e-9));
    }

    #[test]
    fn viewport_centre_maps_to_screen_centre() {
        let viewport = Viewport::new(LatLng::new(9.9, -84.1), 10.0, 800.0, 600.0);
        let (x, y) = viewport.to_screen(viewport.center);
        assert!(close(x, 400.0, 1e-6) && close(y, 300.0, 1e-6));
        let (east, _) = viewport.to_screen(LatLng::new(9.9, -84.0));
        assert!(east > 400.0);
        let (_, north) = viewport.to_screen(LatLng::new(10.0, -84.1));
        assert!(north < 300.0);
    }

    #[test]
    fn fitted_viewport_contains_bounds() {
        let bounds = Bounds {
            south_west: LatLng::new(9.85, -84.2),
            north_east: LatLng::new(10.0, -83.9),
        };
        let viewport = Viewport::fitting(bounds.pad(0.1), 800.0, 600.0);
        let visible = viewport.visible_bounds();
        assert!(visible.contains(bounds.south_west));
        assert!(visible.contains(bounds.north_east));
        assert!(viewport.zoom > 8.0 && viewport.zoom < 13.0);
    }

    #[test]
    fn single_point_fit_is_capped_at_max_zoom() {
        let point = LatLng::new(9.9, -84.1);
        let viewport = Viewport::fitting(Bounds::from_point(point), 800.0, 600.0);
        assert_eq!(viewport.zoom, MAX_ZOOM);
    }

    #[test]
    fn grid_steps_are_round_numbers() {
        assert!(close(grid_step(0.3, 6.0), 0.05, 1e-12));
        assert_eq!(grid_step(10.0, 5.0), 2.0);
        assert_eq!(grid_step(f64::NAN, 5.0), 1.0);
    }
}
