//! Task — the runtime scheduling unit.
//!
//! A [`Task`] pairs an absolute fire time with an async body and an ordered
//! chain of [`Wrapper`]s. At run time the body is decorated by every wrapper
//! in turn, so the last wrapper added is the outermost one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use scenehub_domain::error::{SceneHubError, TimeoutError};
use scenehub_domain::id::TaskId;
use scenehub_domain::time::Timestamp;

/// Heap-allocated, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased task body.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> BoxFuture<Result<(), SceneHubError>> + Send + Sync>;

/// Middleware decorating a task body.
pub type Wrapper = Arc<dyn Fn(TaskFn) -> TaskFn + Send + Sync>;

/// What a running body knows about its own task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub parent_id: Option<TaskId>,
}

/// A unit of work waiting in the scheduler.
pub struct Task {
    pub id: TaskId,
    pub fire_at: Timestamp,
    /// Task that dispatched this one; only used to link audit logs.
    pub parent: Option<TaskId>,
    label: String,
    body: TaskFn,
    wrappers: Vec<Wrapper>,
}

impl Task {
    /// A task firing at `fire_at`.
    pub fn at<F, Fut>(fire_at: Timestamp, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SceneHubError>> + Send + 'static,
    {
        let body: TaskFn = Arc::new(move |ctx: TaskContext| -> BoxFuture<Result<(), SceneHubError>> {
            Box::pin(body(ctx))
        });
        Self {
            id: TaskId::new(),
            fire_at,
            parent: None,
            label: String::new(),
            body,
            wrappers: Vec::new(),
        }
    }

    /// A task firing `delay` from now.
    pub fn after<F, Fut>(delay: Duration, body: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SceneHubError>> + Send + 'static,
    {
        let delay = chrono::TimeDelta::from_std(delay).unwrap_or(chrono::TimeDelta::MAX);
        let fire_at = scenehub_domain::time::now()
            .checked_add_signed(delay)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        Self::at(fire_at, body)
    }

    #[must_use]
    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Human-readable description used in tracing output.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn context(&self) -> TaskContext {
        TaskContext {
            task_id: self.id,
            parent_id: self.parent,
        }
    }

    /// The body decorated by every wrapper.
    #[must_use]
    pub fn compose(&self) -> TaskFn {
        self.wrappers
            .iter()
            .fold(Arc::clone(&self.body), |body, wrapper| wrapper(body))
    }

    /// Run the decorated body. Errors are logged, never returned.
    pub async fn run(self) {
        tracing::debug!(task_id = %self.id, label = %self.label, "running task");
        let body = self.compose();
        if let Err(err) = body(self.context()).await {
            tracing::warn!(task_id = %self.id, label = %self.label, %err, "task failed");
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("fire_at", &self.fire_at)
            .field("parent", &self.parent)
            .field("label", &self.label)
            .field("wrappers", &self.wrappers.len())
            .finish_non_exhaustive()
    }
}

/// Fail the wrapped body with [`SceneHubError::Timeout`] once `limit` elapses.
#[must_use]
pub fn timeout_wrapper(limit: Duration) -> Wrapper {
    Arc::new(move |inner: TaskFn| -> TaskFn {
        Arc::new(move |ctx: TaskContext| -> BoxFuture<Result<(), SceneHubError>> {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                match tokio::time::timeout(limit, inner(ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(TimeoutError { elapsed: limit }.into()),
                }
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tracing_wrapper(name: &'static str, calls: Arc<Mutex<Vec<String>>>) -> Wrapper {
        Arc::new(move |inner: TaskFn| -> TaskFn {
            let calls = Arc::clone(&calls);
            Arc::new(move |ctx: TaskContext| -> BoxFuture<Result<(), SceneHubError>> {
                let inner = Arc::clone(&inner);
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    calls.lock().unwrap().push(format!("{name}:before"));
                    let result = inner(ctx).await;
                    calls.lock().unwrap().push(format!("{name}:after"));
                    result
                })
            })
        })
    }

    #[tokio::test]
    async fn should_apply_last_wrapper_outermost() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let body_calls = Arc::clone(&calls);
        let task = Task::after(Duration::ZERO, move |_| {
            let calls = Arc::clone(&body_calls);
            async move {
                calls.lock().unwrap().push("body".to_string());
                Ok(())
            }
        })
        .with_wrapper(tracing_wrapper("inner", Arc::clone(&calls)))
        .with_wrapper(tracing_wrapper("outer", Arc::clone(&calls)));

        task.run().await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "outer:before",
                "inner:before",
                "body",
                "inner:after",
                "outer:after"
            ]
        );
    }

    #[tokio::test]
    async fn should_pass_own_and_parent_ids_to_body() {
        let parent = TaskId::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_body = Arc::clone(&seen);
        let task = Task::after(Duration::ZERO, move |ctx| {
            *seen_in_body.lock().unwrap() = Some(ctx);
            async { Ok(()) }
        })
        .with_parent(parent);
        let id = task.id;

        task.run().await;

        let ctx = seen.lock().unwrap().unwrap();
        assert_eq!(ctx.task_id, id);
        assert_eq!(ctx.parent_id, Some(parent));
    }

    #[tokio::test]
    async fn should_swallow_body_errors() {
        let task = Task::after(Duration::ZERO, |_| async {
            Err(SceneHubError::storage("disk on fire"))
        });
        task.run().await;
    }

    #[tokio::test]
    async fn should_fail_with_timeout_when_body_is_too_slow() {
        let task = Task::after(Duration::ZERO, |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .with_wrapper(timeout_wrapper(Duration::from_millis(20)));

        let result = task.compose()(task.context()).await;
        assert!(matches!(result, Err(SceneHubError::Timeout(_))));
    }

    #[test]
    fn should_schedule_delayed_task_in_the_future() {
        let before = scenehub_domain::time::now();
        let task = Task::after(Duration::from_secs(5), |_| async { Ok(()) });
        assert!(task.fire_at >= before + chrono::TimeDelta::seconds(5));
    }
}
