use chrono::{DateTime, Utc};
use geotrackcore::model::GeoPoint;
use geotrackcore::ViewMode;
use std::time::Duration;

/// Rows shown in the debug table.
pub const RECENT_ROWS: usize = 5;

/// Inputs for the status line beneath the map.
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs<'a> {
    pub mode: ViewMode,
    pub points: &'a [GeoPoint],
    pub loading: bool,
    /// At least one fetch has been applied since the last mode change.
    pub loaded: bool,
    pub map_notice: Option<&'static str>,
    pub poll_interval: Duration,
    pub window_hours: u32,
}

pub fn status_line(inputs: StatusInputs<'_>) -> String {
    if let Some(notice) = inputs.map_notice {
        return notice.to_string();
    }
    if inputs.loading && !inputs.loaded {
        return "Updating…".into();
    }
    if inputs.loaded && inputs.points.is_empty() {
        return "No locations available".into();
    }
    match inputs.mode {
        ViewMode::Live => format!(
            "Refreshes every {} s",
            inputs.poll_interval.as_secs_f64().round() as u64
        ),
        ViewMode::Historical => format!(
            "{} locations from the last {} h",
            inputs.points.len(),
            inputs.window_hours
        ),
    }
}

/// Distinct device ids in order of first appearance.
pub fn devices(points: &[GeoPoint]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for point in points {
        if !seen.iter().any(|device| device == &point.device_id) {
            seen.push(point.device_id.clone());
        }
    }
    seen
}

/// Timestamp of the newest point, shown as "last update" in live mode.
pub fn last_update(points: &[GeoPoint]) -> Option<DateTime<Utc>> {
    points.iter().map(|point| point.timestamp).max()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentRow {
    pub device: String,
    pub position: String,
    pub accuracy: String,
    pub when: String,
}

pub fn recent_rows(points: &[GeoPoint]) -> Vec<RecentRow> {
    let mut newest: Vec<&GeoPoint> = points.iter().collect();
    newest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    newest
        .into_iter()
        .take(RECENT_ROWS)
        .map(|point| RecentRow {
            device: point.device_id.clone(),
            position: format!("{:.5}, {:.5}", point.lat, point.lng),
            accuracy: point
                .accuracy
                .map(|meters| format!("±{meters:.0} m"))
                .unwrap_or_else(|| "-".into()),
            when: point.timestamp.format("%H:%M:%S").to_string(),
        })
        .collect()
}
