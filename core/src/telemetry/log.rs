use log::{debug, error, info, warn};

/// Routes component messages through the `log` facade under a fixed target.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    target: &'static str,
}

impl LogManager {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "{}", message);
    }

    pub fn trace_step(&self, message: &str) {
        debug!(target: self.target, "{}", message);
    }

    pub fn degraded(&self, message: &str) {
        warn!(target: self.target, "{}", message);
    }

    pub fn failure(&self, message: &str) {
        error!(target: self.target, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("geotrack")
    }
}
