use crate::model::GeoPoint;

/// True when both coordinates are finite numbers inside the WGS84 ranges.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Copies out the points that can be placed on a map, preserving input order.
pub fn valid_points(points: &[GeoPoint]) -> Vec<GeoPoint> {
    points.iter().filter(|point| point.is_valid()).cloned().collect()
}

/// Newest point with usable coordinates. Ties keep the later element.
pub fn newest_valid(points: &[GeoPoint]) -> Option<&GeoPoint> {
    points
        .iter()
        .filter(|point| point.is_valid())
        .max_by_key(|point| point.timestamp)
}
