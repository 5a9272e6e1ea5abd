//! Scheduler — a single control loop over the [`PriorityQueue`].
//!
//! The loop sleeps on one resettable timer. When it wakes it looks at the
//! earliest pending task: if the queue is empty it sleeps for the idle
//! interval, if the task is not yet due it sleeps exactly until its fire
//! time, otherwise it pops the task, hands it to the [`TaskTracker`] and
//! re-checks after the short poll interval. Pushing a task wakes the loop.

mod queue;

pub use queue::PriorityQueue;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use scenehub_domain::id::TaskId;
use scenehub_domain::time::now;

use crate::config::EngineConfig;
use crate::task::Task;

/// Time-ordered task scheduler.
pub struct Scheduler {
    queue: Mutex<PriorityQueue>,
    wake: Notify,
    tracker: TaskTracker,
    poll_interval: Duration,
    idle_interval: Duration,
    shutdown_grace: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            queue: Mutex::new(PriorityQueue::new()),
            wake: Notify::new(),
            tracker: TaskTracker::new(),
            poll_interval: config.poll_interval,
            idle_interval: config.idle_interval,
            shutdown_grace: config.shutdown_grace,
        }
    }

    fn queue(&self) -> MutexGuard<'_, PriorityQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a task and wake the loop.
    pub fn push(&self, task: Task) {
        tracing::debug!(task_id = %task.id, label = task.label(), fire_at = %task.fire_at, "task queued");
        self.queue().push(task);
        self.wake.notify_one();
    }

    /// Drop a pending task. Returns `false` if it already fired or never existed.
    pub fn remove(&self, id: TaskId) -> bool {
        self.queue().remove(id).is_some()
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Number of started tasks whose body has not completed yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Drive the queue until `cancel` fires, then wait up to the shutdown
    /// grace period for in-flight tasks.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("starting scheduler");
        let timer = tokio::time::sleep(self.poll_interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.wake.notified() => {
                    timer.as_mut().reset(Instant::now() + self.poll_interval);
                }
                () = &mut timer => {
                    let next = self.tick();
                    timer.as_mut().reset(Instant::now() + next);
                }
            }
        }

        tracing::info!(pending = self.len(), in_flight = self.in_flight(), "stopping scheduler");
        self.tracker.close();
        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                in_flight = self.in_flight(),
                "shutdown grace period elapsed with tasks still running"
            );
        }
    }

    /// Start at most one due task; returns how long to sleep next.
    fn tick(&self) -> Duration {
        let task = {
            let mut queue = self.queue();
            let current = now();
            match queue.peek().map(|task| task.fire_at) {
                None => return self.idle_interval,
                Some(fire_at) if fire_at > current => {
                    return (fire_at - current).to_std().unwrap_or(self.poll_interval);
                }
                Some(_) => queue.pop(),
            }
        };
        if let Some(task) = task {
            self.tracker.spawn(task.run());
        }
        self.poll_interval
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
