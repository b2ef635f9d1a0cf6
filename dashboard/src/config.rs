use anyhow::Context;
use geotrackcore::control::ControllerConfig;
use geotrackcore::render::{EngineConfig, StylePreset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_server_url() -> String {
    "http://127.0.0.1:9000".into()
}

fn default_tick_ms() -> u64 {
    100
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Signs in on start when both credentials are present.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub style: StylePreset,
    /// Event-loop tick driving the polling clock.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub polling: ControllerConfig,
    #[serde(default)]
    pub map: EngineConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_args(default_server_url(), None, None)
    }
}

impl DashboardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading dashboard config {}", path_ref.display()))?;
        let config: DashboardConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dashboard config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(server_url: String, email: Option<String>, password: Option<String>) -> Self {
        Self {
            server_url,
            email,
            password,
            style: StylePreset::default(),
            tick_ms: default_tick_ms(),
            polling: ControllerConfig::default(),
            map: EngineConfig::default(),
        }
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_args_keeps_polling_defaults() {
        let cfg = DashboardConfig::from_args("http://localhost:9000".into(), None, None);
        assert_eq!(cfg.polling.poll_interval_ms, 3000);
        assert_eq!(cfg.map.fallback_zoom, 10);
        assert!(cfg.credentials().is_none());
    }

    #[test]
    fn load_reads_nested_sections() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"server_url: http://10.0.0.2:9000\nemail: ana@example.com\npassword: demo123\nstyle: highlighted\npolling:\n  poll_interval_ms: 1500\nmap:\n  arrow_stride: 5\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = DashboardConfig::load(&path).unwrap();
        assert_eq!(cfg.style, StylePreset::Highlighted);
        assert_eq!(cfg.polling.poll_interval_ms, 1500);
        assert_eq!(cfg.polling.window_hours, 24);
        assert_eq!(cfg.map.arrow_stride, 5);
        assert_eq!(cfg.map.live_zoom, 16);
        assert_eq!(
            cfg.credentials(),
            Some(("ana@example.com".into(), "demo123".into()))
        );
    }
}
