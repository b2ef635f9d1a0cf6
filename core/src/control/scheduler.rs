use std::collections::BTreeMap;
use std::time::Duration;

/// Identifies one armed repeating timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Repeating-timer facility used by the view-mode controller.
pub trait Scheduler {
    /// Arms a timer that first fires one `interval` from now, then every `interval`.
    fn schedule_repeating(&mut self, interval: Duration) -> TimerId;

    /// Disarms a timer. Returns false when it was not armed.
    fn cancel(&mut self, timer: TimerId) -> bool;

    fn active_timers(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct RepeatingTimer {
    interval: Duration,
    next_due: Duration,
}

/// Scheduler on a virtual clock that only moves when [`advance`](Self::advance)
/// is called.
///
/// A UI event loop drives it from its own tick; tests drive it directly as a
/// fake clock. Firing is reported, not executed, so the caller stays in
/// control of what runs on its thread.
#[derive(Debug, Default)]
pub struct CooperativeScheduler {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, RepeatingTimer>,
}

impl CooperativeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Moves the clock forward and returns every firing that fell due, in
    /// time order. A timer fires once per elapsed interval.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerId> {
        let target = self.now + by;
        let mut fired = Vec::new();

        loop {
            let due = self
                .timers
                .iter()
                .filter(|(_, timer)| timer.next_due <= target)
                .min_by_key(|(id, timer)| (timer.next_due, **id))
                .map(|(id, _)| *id);
            let Some(id) = due else { break };
            if let Some(timer) = self.timers.get_mut(&id) {
                timer.next_due += timer.interval;
            }
            fired.push(id);
        }

        self.now = target;
        fired
    }
}

impl Scheduler for CooperativeScheduler {
    fn schedule_repeating(&mut self, interval: Duration) -> TimerId {
        let interval = interval.max(Duration::from_millis(1));
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(
            id,
            RepeatingTimer {
                interval,
                next_due: self.now + interval,
            },
        );
        id
    }

    fn cancel(&mut self, timer: TimerId) -> bool {
        self.timers.remove(&timer).is_some()
    }

    fn active_timers(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_elapsed_interval() {
        let mut scheduler = CooperativeScheduler::new();
        let timer = scheduler.schedule_repeating(Duration::from_millis(3000));
        assert!(scheduler.advance(Duration::from_millis(2999)).is_empty());
        assert_eq!(scheduler.advance(Duration::from_millis(1)), vec![timer]);
        assert_eq!(
            scheduler.advance(Duration::from_millis(6000)),
            vec![timer, timer]
        );
    }

    #[test]
    fn cancelled_timers_stop_firing() {
        let mut scheduler = CooperativeScheduler::new();
        let first = scheduler.schedule_repeating(Duration::from_millis(100));
        let second = scheduler.schedule_repeating(Duration::from_millis(150));
        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert_eq!(scheduler.active_timers(), 1);
        assert_eq!(scheduler.advance(Duration::from_millis(300)), vec![second, second]);
    }

    #[test]
    fn interleaves_timers_by_due_time() {
        let mut scheduler = CooperativeScheduler::new();
        let slow = scheduler.schedule_repeating(Duration::from_millis(200));
        let fast = scheduler.schedule_repeating(Duration::from_millis(150));
        assert_eq!(
            scheduler.advance(Duration::from_millis(400)),
            vec![fast, slow, fast, slow]
        );
    }
}
