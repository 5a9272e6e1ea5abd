//! Task log repository port — the append-only audit trail.

use std::future::Future;

use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::TaskId;
use scenehub_domain::task_log::TaskLog;

/// Repository for persisting and querying [`TaskLog`]s.
pub trait TaskLogRepository {
    /// Persist a new log entry.
    fn create(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send;

    /// Get the log of a task by its correlation id.
    fn get_by_task_id(
        &self,
        task_id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskLog>, SceneHubError>> + Send;

    /// Logs whose parent is `parent_task_id`, oldest first.
    fn find_children(
        &self,
        parent_task_id: TaskId,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send;

    /// The most recent logs without a parent, newest first.
    fn get_recent_roots(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send;

    /// Overwrite the mutable fields of an existing log entry.
    fn update(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send;
}

impl<T: TaskLogRepository + Send + Sync> TaskLogRepository for std::sync::Arc<T> {
    fn create(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        (**self).create(log)
    }

    fn get_by_task_id(
        &self,
        task_id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskLog>, SceneHubError>> + Send {
        (**self).get_by_task_id(task_id)
    }

    fn find_children(
        &self,
        parent_task_id: TaskId,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        (**self).find_children(parent_task_id)
    }

    fn get_recent_roots(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        (**self).get_recent_roots(limit)
    }

    fn update(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        (**self).update(log)
    }
}
