use crate::model::GeoPoint;
use crate::prelude::LatLng;
use std::collections::HashMap;

/// Chronologically ordered points reported by one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    pub device_id: String,
    pub owner: String,
    pub points: Vec<GeoPoint>,
}

/// Direction marker placed on a trail segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowPlacement {
    pub segment: usize,
    pub position: LatLng,
    pub bearing_deg: f64,
}

impl Trail {
    pub fn vertices(&self) -> Vec<LatLng> {
        self.points.iter().map(GeoPoint::position).collect()
    }

    pub fn start(&self) -> Option<&GeoPoint> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&GeoPoint> {
        self.points.last()
    }

    /// A trail with two or more points is drawn as a route.
    pub fn is_route(&self) -> bool {
        self.points.len() >= 2
    }

    /// Arrows at the midpoint of every `stride`-th segment, starting with the first.
    pub fn arrows(&self, stride: usize) -> Vec<ArrowPlacement> {
        let stride = stride.max(1);
        self.points
            .windows(2)
            .enumerate()
            .step_by(stride)
            .map(|(segment, pair)| {
                let from = pair[0].position();
                let to = pair[1].position();
                ArrowPlacement {
                    segment,
                    position: LatLng::new((from.lat + to.lat) / 2.0, (from.lng + to.lng) / 2.0),
                    bearing_deg: bearing_deg(from, to),
                }
            })
            .collect()
    }
}

/// Groups valid points by device in first-appearance order and sorts each
/// group ascending by timestamp. Invalid coordinates are dropped.
pub fn partition_by_device(points: &[GeoPoint]) -> Vec<Trail> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut trails: Vec<Trail> = Vec::new();

    for point in points.iter().filter(|point| point.is_valid()) {
        let slot = *index.entry(point.device_id.as_str()).or_insert_with(|| {
            trails.push(Trail {
                device_id: point.device_id.clone(),
                owner: point.email.clone(),
                points: Vec::new(),
            });
            trails.len() - 1
        });
        trails[slot].points.push(point.clone());
    }

    for trail in &mut trails {
        trail.points.sort_by_key(|point| point.timestamp);
    }
    trails
}

/// Initial great-circle bearing from `from` to `to`, in degrees clockwise from north.
pub fn bearing_deg(from: LatLng, to: LatLng) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lng - from.lng).to_radians();
    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(device: &str, lat: f64, lng: f64, minutes: i64) -> GeoPoint {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        GeoPoint::new("ana@example.com", device, lat, lng, base + Duration::minutes(minutes))
    }

    #[test]
    fn groups_in_first_appearance_order_and_sorts_by_time() {
        let points = vec![
            sample("b", 1.0, 1.0, 5),
            sample("a", 2.0, 2.0, 9),
            sample("b", 3.0, 3.0, 1),
            sample("a", f64::NAN, 2.0, 0),
            sample("a", 4.0, 4.0, 3),
        ];
        let trails = partition_by_device(&points);
        assert_eq!(trails.len(), 2);
        assert_eq!(trails[0].device_id, "b");
        assert_eq!(
            trails[0].vertices(),
            vec![LatLng::new(3.0, 3.0), LatLng::new(1.0, 1.0)]
        );
        assert_eq!(trails[1].points.len(), 2);
        assert_eq!(trails[1].start().unwrap().lat, 4.0);
    }

    #[test]
    fn sorting_is_idempotent() {
        let points = vec![
            sample("a", 1.0, 1.0, 3),
            sample("a", 2.0, 2.0, 1),
            sample("a", 3.0, 3.0, 2),
        ];
        let once = partition_by_device(&points);
        let twice = partition_by_device(&once[0].points);
        assert_eq!(once, twice);
    }

    #[test]
    fn arrows_follow_stride() {
        let points: Vec<GeoPoint> = (0..8)
            .map(|i| sample("a", i as f64 * 0.01, 0.0, i))
            .collect();
        let trail = &partition_by_device(&points)[0];
        let arrows = trail.arrows(3);
        let segments: Vec<usize> = arrows.iter().map(|arrow| arrow.segment).collect();
        assert_eq!(segments, vec![0, 3, 6]);
        assert!(arrows[0].bearing_deg < 1e-6 || arrows[0].bearing_deg > 359.999);
    }

    #[test]
    fn bearing_points_east() {
        let bearing = bearing_deg(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0));
        assert!((bearing - 90.0).abs() < 1e-6);
    }
}
