use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account as seen by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            email: email.into(),
            name: name.into(),
            device_id: device_id.into(),
            is_active: true,
            last_active: None,
        }
    }
}
