use std::time::{Duration, Instant};

/// Default scheduling quantum.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Default time an effect gets to stop before it is forced to `Failed`.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(200);

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    /// Stop steps an instance gets: `ceil(stop_timeout / tick_interval)`,
    /// at least one.
    pub fn stop_budget(&self) -> u64 {
        let tick = self.tick_interval.as_nanos();
        if tick == 0 {
            return 1;
        }
        let steps = self.stop_timeout.as_nanos().div_ceil(tick);
        u64::try_from(steps).unwrap_or(u64::MAX).max(1)
    }

    /// When a stop started at `from` runs out of time. `None` if the
    /// timeout is too large to represent; the step budget still applies.
    pub fn stop_deadline(&self, from: Instant) -> Option<Instant> {
        from.checked_add(self.stop_timeout)
    }
}
