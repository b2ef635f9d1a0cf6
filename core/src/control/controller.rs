use crate::control::collaborators::CollaboratorError;
use crate::control::scheduler::{CooperativeScheduler, Scheduler, TimerId};
use crate::model::GeoPoint;
use crate::prelude::ViewMode;
use crate::telemetry::{LogManager, MetricsRecorder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub poll_interval_ms: u64,
    pub window_hours: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            window_hours: 24,
        }
    }
}

impl ControllerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Most recent point of the current user.
    Latest,
    /// Every point of the current user from the last `hours` hours.
    Window { hours: u32 },
}

/// Identifies the controller state a fetch was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    /// Controller instance that issued the fetch.
    pub controller: u64,
    pub mode: ViewMode,
    pub epoch: u64,
    pub sequence: u64,
}

/// A fetch the host must run and hand back through [`ViewModeController::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: FetchKind,
    pub ticket: FetchTicket,
}

pub type FetchResult = Result<Vec<GeoPoint>, CollaboratorError>;

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The result is now the current point set.
    Applied,
    /// Issued before the last mode change; dropped.
    StaleMode,
    /// Issued by a different controller instance; dropped.
    Foreign,
    /// A newer fetch of the same mode already landed; dropped.
    Superseded,
    /// The controller was shut down; dropped.
    Unmounted,
}

/// Owns the view mode, the polling timer and the current point set.
///
/// The controller never performs I/O. Mode changes and timer firings hand
/// out [`FetchRequest`]s; the host runs them and reports back with
/// [`complete`](Self::complete). Each request carries a ticket so results from
/// a previous mode, or older than one already applied, are ignored.
pub struct ViewModeController<S: Scheduler = CooperativeScheduler> {
    id: u64,
    scheduler: S,
    config: ControllerConfig,
    mode: ViewMode,
    epoch: u64,
    next_sequence: u64,
    applied_sequence: u64,
    in_flight: BTreeSet<u64>,
    timer: Option<TimerId>,
    points: Vec<GeoPoint>,
    mounted: bool,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl<S: Scheduler> ViewModeController<S> {
    pub fn new(scheduler: S, config: ControllerConfig) -> Self {
        Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            scheduler,
            config,
            mode: ViewMode::default(),
            epoch: 0,
            next_sequence: 0,
            applied_sequence: 0,
            in_flight: BTreeSet::new(),
            timer: None,
            points: Vec::new(),
            mounted: true,
            logger: LogManager::new("geotrack::control"),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Seeds the point set, e.g. with data rendered before the controller existed.
    pub fn with_initial_points(mut self, points: Vec<GeoPoint>) -> Self {
        self.points = points;
        self
    }

    pub fn current_mode(&self) -> ViewMode {
        self.mode
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Enters the current mode, issuing its first fetch.
    pub fn start(&mut self) -> Option<FetchRequest> {
        self.set_mode(self.mode)
    }

    /// Cancels any armed timer, then enters `mode`: live arms a repeating
    /// timer and fetches the latest point, historical fetches the window once.
    pub fn set_mode(&mut self, mode: ViewMode) -> Option<FetchRequest> {
        if !self.mounted {
            return None;
        }
        self.disarm();
        self.mode = mode;
        self.epoch += 1;
        self.applied_sequence = 0;
        self.in_flight.clear();
        self.logger.record(&format!("view mode -> {mode}"));

        let kind = match mode {
            ViewMode::Live => {
                self.timer = Some(
                    self.scheduler
                        .schedule_repeating(self.config.poll_interval()),
                );
                FetchKind::Latest
            }
            ViewMode::Historical => FetchKind::Window {
                hours: self.config.window_hours,
            },
        };
        Some(self.issue(kind))
    }

    pub fn toggle_mode(&mut self) -> Option<FetchRequest> {
        self.set_mode(self.mode.toggled())
    }

    /// Reacts to a timer firing. Only the currently armed live timer polls.
    pub fn on_timer(&mut self, timer: TimerId) -> Option<FetchRequest> {
        if !self.mounted || self.mode != ViewMode::Live || self.timer != Some(timer) {
            self.logger
                .trace_step(&format!("ignoring stale timer {timer:?}"));
            return None;
        }
        Some(self.issue(FetchKind::Latest))
    }

    /// Records the outcome of a fetch. Failures clear the point set rather
    /// than surfacing an error.
    pub fn complete(&mut self, ticket: FetchTicket, result: FetchResult) -> CompletionStatus {
        if !self.mounted {
            return CompletionStatus::Unmounted;
        }
        if ticket.controller != self.id {
            self.metrics.record_stale_result();
            self.logger
                .trace_step("dropping result issued by another controller");
            return CompletionStatus::Foreign;
        }
        if ticket.epoch != self.epoch || ticket.mode != self.mode {
            self.metrics.record_stale_result();
            self.logger.trace_step(&format!(
                "dropping {} result issued before the last mode change",
                ticket.mode
            ));
            return CompletionStatus::StaleMode;
        }

        self.in_flight.remove(&ticket.sequence);
        if ticket.sequence < self.applied_sequence {
            self.metrics.record_stale_result();
            return CompletionStatus::Superseded;
        }
        self.applied_sequence = ticket.sequence;

        self.points = match result {
            Ok(points) => {
                self.metrics.record_fetch_applied();
                points
            }
            Err(err) => {
                self.metrics.record_fetch_failure();
                self.logger
                    .degraded(&format!("{} fetch failed: {err}", ticket.mode));
                Vec::new()
            }
        };
        CompletionStatus::Applied
    }

    /// Cancels the timer and stops accepting results.
    pub fn shutdown(&mut self) {
        if !self.mounted {
            return;
        }
        self.disarm();
        self.in_flight.clear();
        self.mounted = false;
        self.logger.record("controller shut down");
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn issue(&mut self, kind: FetchKind) -> FetchRequest {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.in_flight.insert(sequence);
        FetchRequest {
            kind,
            ticket: FetchTicket {
                controller: self.id,
                mode: self.mode,
                epoch: self.epoch,
                sequence,
            },
        }
    }
}

impl ViewModeController<CooperativeScheduler> {
    /// Advances the virtual clock and turns every firing into a fetch request.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<FetchRequest> {
        let fired = self.scheduler.advance(elapsed);
        fired
            .into_iter()
            .filter_map(|timer| self.on_timer(timer))
            .collect()
    }

    /// Like [`advance`](Self::advance), but firings missed while the host was
    /// stalled collapse into a single poll.
    pub fn advance_coalesced(&mut self, elapsed: Duration) -> Option<FetchRequest> {
        let mut fired = self.scheduler.advance(elapsed);
        fired.sort();
        fired.dedup();
        fired.into_iter().find_map(|timer| self.on_timer(timer))
    }
}

impl<S: Scheduler> Drop for ViewModeController<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
