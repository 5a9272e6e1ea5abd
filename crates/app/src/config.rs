//! Engine tuning handed in by the composition root.

use std::time::Duration;

use chrono::NaiveTime;

/// Timing parameters of the scheduler and scene manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Re-check interval right after a task was started or pushed.
    pub poll_interval: Duration,
    /// Sleep interval while the queue is empty.
    pub idle_interval: Duration,
    /// Upper bound on a single task body.
    pub task_timeout: Duration,
    /// How long shutdown waits for in-flight tasks.
    pub shutdown_grace: Duration,
    /// Local time of day at which the next day's timers are arranged.
    pub arrange_at: NaiveTime,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            idle_interval: Duration::from_secs(5 * 60),
            task_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            arrange_at: NaiveTime::from_hms_opt(23, 55, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}
