use crate::prelude::LatLng;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One reported location sample.
///
/// Coordinates decode leniently: a missing, null or non-numeric `lat`/`lng`
/// becomes NaN so the sample is dropped by validation instead of failing the
/// whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lat: f64,
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lng: f64,
    #[serde(default, deserialize_with = "lenient_accuracy")]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl GeoPoint {
    pub fn new(
        email: impl Into<String>,
        device_id: impl Into<String>,
        lat: f64,
        lng: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into(),
            device_id: device_id.into(),
            lat,
            lng,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn is_valid(&self) -> bool {
        crate::geo::is_valid_coordinate(self.lat, self.lng)
    }
}

/// Body a device posts when it reports its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lat: f64,
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lng: f64,
    #[serde(default, deserialize_with = "lenient_accuracy")]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationReport {
    /// Stamps the report with its owner. The owner's registered device is used
    /// when the report does not name one, and `now` when it carries no time.
    pub fn into_point(self, email: &str, registered_device: &str, now: DateTime<Utc>) -> GeoPoint {
        GeoPoint {
            email: email.to_string(),
            device_id: self
                .device_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| registered_device.to_string()),
            lat: self.lat,
            lng: self.lng,
            accuracy: self.accuracy,
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

fn lenient_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn lenient_accuracy<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_camel_case_wire_shape() {
        let json = r#"{
            "_id": "64f0",
            "userId": "u1",
            "email": "ana@example.com",
            "deviceId": "phone-1",
            "lat": 9.93,
            "lng": -84.09,
            "accuracy": 12.5,
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        let point: GeoPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.device_id, "phone-1");
        assert_eq!(point.accuracy, Some(12.5));
        assert!(point.is_valid());
    }

    #[test]
    fn non_numeric_coordinates_decode_as_nan() {
        let json = r#"[
            {"deviceId": "a", "lat": "9.9", "lng": -84.0, "timestamp": "2024-05-01T12:00:00Z"},
            {"deviceId": "b", "lat": null, "lng": -84.0, "timestamp": "2024-05-01T12:00:00Z"},
            {"deviceId": "c", "lng": -84.0, "timestamp": "2024-05-01T12:00:00Z"}
        ]"#;
        let points: Vec<GeoPoint> = serde_json::from_str(json).unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|point| point.lat.is_nan()));
        assert!(points.iter().all(|point| !point.is_valid()));
    }

    #[test]
    fn report_falls_back_to_registered_device_and_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let report: LocationReport =
            serde_json::from_str(r#"{"lat": 9.9, "lng": -84.1, "deviceId": "  "}"#).unwrap();
        let point = report.into_point("ana@example.com", "phone-1", now);
        assert_eq!(point.device_id, "phone-1");
        assert_eq!(point.timestamp, now);
        assert_eq!(point.email, "ana@example.com");
    }
}
