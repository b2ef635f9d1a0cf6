use chrono::{DateTime, Duration, Utc};
use geotrackcore::model::GeoPoint;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of a synthetic device trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub origin_lat: f64,
    pub origin_lng: f64,
    /// Number of samples in the trail.
    pub samples: usize,
    /// Seconds between consecutive samples.
    pub interval_secs: i64,
    /// Largest per-sample step in degrees.
    pub step_deg: f64,
    /// Upper bound of the reported accuracy in meters.
    pub max_accuracy_m: f64,
    pub seed: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            origin_lat: 9.9281,
            origin_lng: -84.0907,
            samples: 40,
            interval_secs: 60,
            step_deg: 0.0015,
            max_accuracy_m: 25.0,
            seed: 0,
        }
    }
}

/// Persistent random walk. The heading drifts a little each step so the trail
/// reads as a route rather than noise.
struct Walker {
    rng: StdRng,
    lat: f64,
    lng: f64,
    heading: f64,
    step_deg: f64,
    max_accuracy_m: f64,
}

impl Walker {
    fn new(config: &RouteConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let heading = rng.gen_range(0.0..std::f64::consts::TAU);
        Self {
            rng,
            lat: config.origin_lat,
            lng: config.origin_lng,
            heading,
            step_deg: config.step_deg.abs(),
            max_accuracy_m: config.max_accuracy_m.max(1.0),
        }
    }

    fn step(&mut self) -> (f64, f64, f64) {
        self.heading += self.rng.gen_range(-0.5..0.5);
        let distance = self.step_deg * self.rng.gen_range(0.4..1.0);
        self.lat = (self.lat + distance * self.heading.cos()).clamp(-89.0, 89.0);
        self.lng += distance * self.heading.sin();
        if self.lng > 180.0 {
            self.lng -= 360.0;
        } else if self.lng < -180.0 {
            self.lng += 360.0;
        }
        let accuracy = self.rng.gen_range(1.0..self.max_accuracy_m + 1.0);
        (self.lat, self.lng, accuracy)
    }
}

/// Builds a trail ending at `end`, oldest sample first.
pub fn build_trail(
    config: &RouteConfig,
    email: &str,
    device_id: &str,
    end: DateTime<Utc>,
) -> Vec<GeoPoint> {
    let mut walker = Walker::new(config);
    let count = config.samples;
    (0..count)
        .map(|index| {
            let (lat, lng, accuracy) = walker.step();
            let back = config.interval_secs * (count - 1 - index) as i64;
            GeoPoint::new(email, device_id, lat, lng, end - Duration::seconds(back))
                .with_accuracy(accuracy)
        })
        .collect()
}

/// Produces one report per tick for a single simulated device.
pub struct DeviceEmulator {
    email: String,
    device_id: String,
    walker: Walker,
}

impl DeviceEmulator {
    pub fn new(email: impl Into<String>, device_id: impl Into<String>, config: &RouteConfig) -> Self {
        Self {
            email: email.into(),
            device_id: device_id.into(),
            walker: Walker::new(config),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn next_point(&mut self, now: DateTime<Utc>) -> GeoPoint {
        let (lat, lng, accuracy) = self.walker.step();
        GeoPoint::new(self.email.clone(), self.device_id.clone(), lat, lng, now)
            .with_accuracy(accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn trail_is_time_ordered_and_ends_at_end() {
        let config = RouteConfig {
            samples: 10,
            interval_secs: 30,
            ..Default::default()
        };
        let trail = build_trail(&config, "ana@example.com", "ana-phone", end());
        assert_eq!(trail.len(), 10);
        assert_eq!(trail.last().unwrap().timestamp, end());
        assert_eq!(trail[0].timestamp, end() - Duration::seconds(270));
        assert!(trail.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(trail.iter().all(GeoPoint::is_valid));
    }

    #[test]
    fn same_seed_gives_same_trail() {
        let config = RouteConfig {
            seed: 7,
            ..Default::default()
        };
        let a = build_trail(&config, "a@example.com", "d", end());
        let b = build_trail(&config, "a@example.com", "d", end());
        assert_eq!(a, b);
    }

    #[test]
    fn emulator_stays_near_origin() {
        let config = RouteConfig::default();
        let mut emulator = DeviceEmulator::new("ana@example.com", "ana-phone", &config);
        let mut last = emulator.next_point(end());
        for step in 1..100 {
            last = emulator.next_point(end() + Duration::seconds(step));
        }
        assert_eq!(last.device_id, "ana-phone");
        assert!((last.lat - config.origin_lat).abs() < 100.0 * config.step_deg);
        assert!(last.accuracy.unwrap() >= 1.0);
    }
}
