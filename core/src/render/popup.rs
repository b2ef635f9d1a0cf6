use crate::model::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role a marker plays on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Start,
    End,
    Live,
    Waypoint,
}

impl MarkerKind {
    pub fn label(self) -> &'static str {
        match self {
            MarkerKind::Start => "Start",
            MarkerKind::End => "End",
            MarkerKind::Live => "Live",
            MarkerKind::Waypoint => "Location",
        }
    }
}

/// Detail shown when a marker is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupView {
    pub kind: MarkerKind,
    pub owner: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
}

impl PopupView {
    pub fn for_point(kind: MarkerKind, point: &GeoPoint) -> Self {
        Self {
            kind,
            owner: point.email.clone(),
            device: point.device_id.clone(),
            timestamp: point.timestamp,
        }
    }
}

/// Multi-line popup text.
pub fn render_popup(view: &PopupView) -> String {
    format!(
        "{} · {}\nDevice: {}\n{}",
        view.kind.label(),
        view.owner,
        view.device,
        view.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Short single-line label used beside the live marker.
pub fn marker_label(view: &PopupView) -> String {
    format!("{} @ {}", view.owner, view.timestamp.format("%H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn popup_lists_owner_device_and_time() {
        let point = GeoPoint::new(
            "ana@example.com",
            "phone-1",
            9.93,
            -84.09,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap(),
        );
        let view = PopupView::for_point(MarkerKind::Start, &point);
        assert_eq!(
            render_popup(&view),
            "Start · ana@example.com\nDevice: phone-1\n2024-05-01 12:30:05 UTC"
        );
        assert_eq!(marker_label(&view), "ana@example.com @ 12:30:05");
    }
}
