//! Task-log recorder — writes the audit trail around every task body.
//!
//! The recorder's [`wrapper`](TaskLogRecorder::wrapper) creates a
//! [`TaskLog`] right before the body runs and finalizes it afterwards. A task
//! that dispatched children is only finalized once every dispatched child
//! holds a terminal result; finishing a child re-derives its parent, and so
//! on up to the root.
//!
//! Audit failures are logged and never fail the task itself.

use std::sync::Arc;

use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::TaskId;
use scenehub_domain::scene::Scene;
use scenehub_domain::task_log::{TaskLog, TaskLogKind};
use scenehub_domain::time::now;

use crate::ports::TaskLogRepository;
use crate::task::{BoxFuture, TaskContext, TaskFn, Wrapper};

/// Display information written into a task's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub name: String,
    pub kind: TaskLogKind,
    pub location: Option<String>,
}

impl LogTarget {
    #[must_use]
    pub fn scene(scene: &Scene) -> Self {
        Self {
            name: scene.name.clone(),
            kind: TaskLogKind::Scene,
            location: None,
        }
    }

    #[must_use]
    pub fn device(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            kind: TaskLogKind::Device,
            location: device.location.clone(),
        }
    }

    /// Placeholder for a target that could not be resolved.
    #[must_use]
    pub fn unresolved(kind: TaskLogKind, id: impl std::fmt::Display) -> Self {
        Self {
            name: id.to_string(),
            kind,
            location: None,
        }
    }
}

/// Records and aggregates [`TaskLog`]s.
pub struct TaskLogRecorder<L> {
    repo: Arc<L>,
}

impl<L> Clone for TaskLogRecorder<L> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<L> TaskLogRecorder<L>
where
    L: TaskLogRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<L>) -> Self {
        Self { repo }
    }

    /// Wrapper logging the task against `target`.
    #[must_use]
    pub fn wrapper(&self, target: LogTarget) -> Wrapper {
        let recorder = self.clone();
        Arc::new(move |inner: TaskFn| -> TaskFn {
            let recorder = recorder.clone();
            let target = target.clone();
            Arc::new(move |ctx: TaskContext| -> BoxFuture<Result<(), SceneHubError>> {
                let recorder = recorder.clone();
                let target = target.clone();
                let inner = Arc::clone(&inner);
                Box::pin(async move {
                    recorder.start(ctx, target).await;
                    let result = inner(ctx).await;
                    recorder.finish(ctx.task_id, result.as_ref().err()).await;
                    result
                })
            })
        })
    }

    /// Create the log entry of a task about to run.
    pub async fn start(&self, ctx: TaskContext, target: LogTarget) {
        let log = TaskLog::new(
            ctx.task_id,
            ctx.parent_id,
            target.name,
            target.kind,
            target.location,
        );
        if let Err(err) = self.repo.create(log).await {
            tracing::error!(task_id = %ctx.task_id, %err, "failed to create task log");
        }
    }

    /// Declare that `task_id` dispatched `count` child tasks.
    ///
    /// Must be called before the children are scheduled.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the log cannot be read or written.
    pub async fn expect_children(&self, task_id: TaskId, count: u32) -> Result<(), SceneHubError> {
        let Some(mut log) = self.repo.get_by_task_id(task_id).await? else {
            return Ok(());
        };
        log.expected_children = count;
        self.repo.update(log).await?;
        Ok(())
    }

    /// Finalize a task's log once its body returned.
    pub async fn finish(&self, task_id: TaskId, error: Option<&SceneHubError>) {
        if let Err(err) = self.try_finish(task_id, error).await {
            tracing::error!(%task_id, %err, "failed to finish task log");
        }
    }

    async fn try_finish(
        &self,
        task_id: TaskId,
        error: Option<&SceneHubError>,
    ) -> Result<(), SceneHubError> {
        let Some(mut log) = self.repo.get_by_task_id(task_id).await? else {
            tracing::warn!(%task_id, "no task log to finish");
            return Ok(());
        };
        if log.is_terminal() {
            return Ok(());
        }
        match error {
            Some(err) => log.finish(Err(err), now()),
            None if log.expected_children == 0 => log.finish(Ok(()), now()),
            None => {
                let children = self.repo.find_children(task_id).await?;
                let Some(result) = log.aggregate_children(&children) else {
                    return Ok(());
                };
                log.result = Some(result);
                log.finished = true;
                log.finished_at = Some(now());
            }
        }
        let parent = log.parent_task_id;
        self.repo.update(log).await?;
        if let Some(parent) = parent {
            self.propagate(parent).await?;
        }
        Ok(())
    }

    /// Re-derive ancestors after a child reached a terminal result.
    async fn propagate(&self, mut task_id: TaskId) -> Result<(), SceneHubError> {
        loop {
            let Some(mut log) = self.repo.get_by_task_id(task_id).await? else {
                return Ok(());
            };
            if log.is_terminal() {
                return Ok(());
            }
            let children = self.repo.find_children(task_id).await?;
            let Some(result) = log.aggregate_children(&children) else {
                return Ok(());
            };
            log.result = Some(result);
            log.finished = true;
            log.finished_at = Some(now());
            let parent = log.parent_task_id;
            self.repo.update(log).await?;
            tracing::debug!(%task_id, %result, "task log aggregated");
            match parent {
                Some(parent) => task_id = parent,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryTaskLogRepo;
    use scenehub_domain::error::DeviceOfflineError;
    use scenehub_domain::task_log::TaskResult;

    fn recorder() -> (TaskLogRecorder<InMemoryTaskLogRepo>, Arc<InMemoryTaskLogRepo>) {
        let repo = Arc::new(InMemoryTaskLogRepo::default());
        (TaskLogRecorder::new(Arc::clone(&repo)), repo)
    }

    fn ctx(parent: Option<TaskId>) -> TaskContext {
        TaskContext {
            task_id: TaskId::new(),
            parent_id: parent,
        }
    }

    fn lamp() -> LogTarget {
        LogTarget {
            name: "lamp".to_string(),
            kind: TaskLogKind::Device,
            location: Some("Office".to_string()),
        }
    }

    fn offline() -> SceneHubError {
        DeviceOfflineError {
            identity: "lamp".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn should_finish_leaf_log_with_success() {
        let (recorder, repo) = recorder();
        let leaf = ctx(None);
        recorder.start(leaf, lamp()).await;
        recorder.finish(leaf.task_id, None).await;

        let log = repo.get(leaf.task_id).unwrap();
        assert!(log.finished);
        assert_eq!(log.result, Some(TaskResult::Success));
        assert_eq!(log.location.as_deref(), Some("Office"));
    }

    #[tokio::test]
    async fn should_mark_parent_partial_only_after_all_children_finish() {
        let (recorder, repo) = recorder();
        let parent = ctx(None);
        recorder
            .start(parent, LogTarget::unresolved(TaskLogKind::Scene, "scene"))
            .await;
        recorder.expect_children(parent.task_id, 3).await.unwrap();
        recorder.finish(parent.task_id, None).await;
        assert!(!repo.get(parent.task_id).unwrap().finished);

        let children: Vec<_> = (0..3).map(|_| ctx(Some(parent.task_id))).collect();
        for child in &children {
            recorder.start(*child, lamp()).await;
        }
        recorder.finish(children[0].task_id, None).await;
        recorder.finish(children[1].task_id, None).await;
        assert!(!repo.get(parent.task_id).unwrap().finished);

        recorder.finish(children[2].task_id, Some(&offline())).await;
        let log = repo.get(parent.task_id).unwrap();
        assert!(log.finished);
        assert_eq!(log.result, Some(TaskResult::PartialSuccess));
        assert_eq!(
            repo.get(children[2].task_id).unwrap().result,
            Some(TaskResult::TargetDisconnected)
        );
    }

    #[tokio::test]
    async fn should_wait_for_children_that_have_not_started() {
        let (recorder, repo) = recorder();
        let parent = ctx(None);
        recorder
            .start(parent, LogTarget::unresolved(TaskLogKind::Scene, "scene"))
            .await;
        recorder.expect_children(parent.task_id, 2).await.unwrap();
        recorder.finish(parent.task_id, None).await;

        let early = ctx(Some(parent.task_id));
        recorder.start(early, lamp()).await;
        recorder.finish(early.task_id, None).await;
        assert!(!repo.get(parent.task_id).unwrap().finished);

        let delayed = ctx(Some(parent.task_id));
        recorder.start(delayed, lamp()).await;
        recorder.finish(delayed.task_id, None).await;
        assert_eq!(
            repo.get(parent.task_id).unwrap().result,
            Some(TaskResult::Success)
        );
    }

    #[tokio::test]
    async fn should_aggregate_through_nested_levels() {
        let (recorder, repo) = recorder();
        let root = ctx(None);
        let scene = LogTarget::unresolved(TaskLogKind::Scene, "scene");
        recorder.start(root, scene.clone()).await;
        recorder.expect_children(root.task_id, 1).await.unwrap();
        recorder.finish(root.task_id, None).await;

        let middle = ctx(Some(root.task_id));
        recorder.start(middle, scene).await;
        recorder.expect_children(middle.task_id, 1).await.unwrap();
        recorder.finish(middle.task_id, None).await;

        let leaf = ctx(Some(middle.task_id));
        recorder.start(leaf, lamp()).await;
        recorder.finish(leaf.task_id, Some(&offline())).await;

        assert_eq!(repo.get(middle.task_id).unwrap().result, Some(TaskResult::Fail));
        assert_eq!(repo.get(root.task_id).unwrap().result, Some(TaskResult::Fail));
    }

    #[tokio::test]
    async fn should_record_log_around_wrapped_body() {
        let (recorder, repo) = recorder();
        let task = crate::task::Task::after(std::time::Duration::ZERO, |_| async {
            Err(SceneHubError::storage("boom"))
        })
        .with_wrapper(recorder.wrapper(lamp()));
        let id = task.id;

        task.run().await;

        let log = repo.get(id).unwrap();
        assert_eq!(log.result, Some(TaskResult::Fail));
        assert_eq!(log.error.as_deref(), Some("storage error: boom"));
    }
}
