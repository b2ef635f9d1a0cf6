use crate::store::StoreLimits;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

fn default_token_ttl_hours() -> u32 {
    24 * 7
}

fn default_emulate_interval_secs() -> u64 {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default)]
    pub limits: StoreLimits,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u32,
    /// Seed demo accounts and trails at startup.
    #[serde(default)]
    pub demo: bool,
    /// Seconds between emulated device reports. Zero disables the emulator.
    #[serde(default = "default_emulate_interval_secs")]
    pub emulate_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_args(default_bind(), false)
    }
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading service config {}", path_ref.display()))?;
        let config: ServiceConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing service config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(bind: SocketAddr, demo: bool) -> Self {
        Self {
            bind,
            limits: StoreLimits::default(),
            token_ttl_hours: default_token_ttl_hours(),
            demo,
            emulate_interval_secs: default_emulate_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn from_args_uses_service_defaults() {
        let cfg = ServiceConfig::from_args(default_bind(), true);
        assert_eq!(cfg.token_ttl_hours, 168);
        assert_eq!(cfg.limits.recent, 500);
        assert!(cfg.demo);
    }

    #[test]
    fn load_reads_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"bind: 0.0.0.0:8088\nlimits:\n  recent: 50\ndemo: true\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = ServiceConfig::load(&path).unwrap();
        assert_eq!(cfg.bind.port(), 8088);
        assert_eq!(cfg.limits.recent, 50);
        assert_eq!(cfg.limits.all, 1000);
        assert_eq!(cfg.emulate_interval_secs, 3);
    }

    #[test]
    fn load_reports_the_failing_path() {
        let err = ServiceConfig::load("/nonexistent/geotrack.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/geotrack.yaml"));
    }
}
