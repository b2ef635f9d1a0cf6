use std::sync::Mutex;

/// Counters kept by the engine and controller.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub renders: usize,
    pub layer_failures: usize,
    pub fetches_applied: usize,
    pub fetch_failures: usize,
    pub stale_results: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn bump(&self, update: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            update(&mut metrics);
        }
    }

    pub fn record_render(&self) {
        self.bump(|metrics| metrics.renders += 1);
    }

    pub fn record_layer_failure(&self) {
        self.bump(|metrics| metrics.layer_failures += 1);
    }

    pub fn record_fetch_applied(&self) {
        self.bump(|metrics| metrics.fetches_applied += 1);
    }

    pub fn record_fetch_failure(&self) {
        self.bump(|metrics| metrics.fetch_failures += 1);
    }

    pub fn record_stale_result(&self) {
        self.bump(|metrics| metrics.stale_results += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
