//! `SQLite` implementation of [`TaskLogRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use scenehub_app::ports::TaskLogRepository;
use scenehub_domain::error::{NotFoundError, SceneHubError};
use scenehub_domain::id::TaskId;
use scenehub_domain::task_log::{TaskLog, TaskLogKind, TaskResult};

use crate::error::StorageError;
use crate::time;

struct Wrapper(TaskLog);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<TaskLog> {
        value.map(|w| w.0)
    }
}

fn decode<T: FromStr<Err = String>>(value: &str) -> Result<T, sqlx::Error> {
    T::from_str(value).map_err(|err| sqlx::Error::Decode(err.into()))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let task_id: String = row.try_get("task_id")?;
        let parent_task_id: Option<String> = row.try_get("parent_task_id")?;
        let kind: String = row.try_get("kind")?;
        let result: Option<String> = row.try_get("result")?;
        let expected_children: i64 = row.try_get("expected_children")?;
        let created_at: String = row.try_get("created_at")?;

        let task_id =
            TaskId::from_str(&task_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let parent_task_id = parent_task_id
            .map(|s| TaskId::from_str(&s))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(TaskLog {
            task_id,
            parent_task_id,
            name: row.try_get("name")?,
            kind: decode::<TaskLogKind>(&kind)?,
            location: row.try_get("location")?,
            finished: row.try_get("finished")?,
            result: result.as_deref().map(decode::<TaskResult>).transpose()?,
            error: row.try_get("error")?,
            expected_children: u32::try_from(expected_children)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            created_at: time::decode(&created_at)?,
            finished_at: time::decode_opt(row.try_get("finished_at")?)?,
        }))
    }
}

const INSERT: &str = "INSERT INTO task_logs (task_id, parent_task_id, name, kind, location, finished, result, error, expected_children, created_at, finished_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
const UPDATE: &str = "UPDATE task_logs SET finished = ?, result = ?, error = ?, expected_children = ?, finished_at = ? WHERE task_id = ?";
const SELECT_BY_ID: &str = "SELECT * FROM task_logs WHERE task_id = ?";
const SELECT_CHILDREN: &str =
    "SELECT * FROM task_logs WHERE parent_task_id = ? ORDER BY created_at, rowid";
const SELECT_RECENT_ROOTS: &str =
    "SELECT * FROM task_logs WHERE parent_task_id IS NULL ORDER BY created_at DESC, rowid DESC LIMIT ?";

/// `SQLite`-backed task log repository.
#[derive(Clone)]
pub struct SqliteTaskLogRepository {
    pool: SqlitePool,
}

impl SqliteTaskLogRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TaskLogRepository for SqliteTaskLogRepository {
    fn create(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(log.task_id.to_string())
                .bind(log.parent_task_id.map(|id| id.to_string()))
                .bind(&log.name)
                .bind(log.kind.as_str())
                .bind(&log.location)
                .bind(log.finished)
                .bind(log.result.map(TaskResult::as_str))
                .bind(&log.error)
                .bind(i64::from(log.expected_children))
                .bind(time::encode(log.created_at))
                .bind(log.finished_at.map(time::encode))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(log)
        }
    }

    fn get_by_task_id(
        &self,
        task_id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskLog>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(task_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_children(
        &self,
        parent_task_id: TaskId,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_CHILDREN)
                .bind(parent_task_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn get_recent_roots(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT_ROOTS)
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let updated = sqlx::query(UPDATE)
                .bind(log.finished)
                .bind(log.result.map(TaskResult::as_str))
                .bind(&log.error)
                .bind(i64::from(log.expected_children))
                .bind(log.finished_at.map(time::encode))
                .bind(log.task_id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if updated.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "TaskLog",
                    id: log.task_id.to_string(),
                }
                .into());
            }
            Ok(log)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use scenehub_domain::error::DeviceOfflineError;

    async fn setup() -> SqliteTaskLogRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteTaskLogRepository::new(db.pool().clone())
    }

    fn root(name: &str) -> TaskLog {
        TaskLog::new(TaskId::new(), None, name, TaskLogKind::Scene, None)
    }

    #[tokio::test]
    async fn should_create_and_retrieve_log() {
        let repo = setup().await;
        let log = TaskLog::new(
            TaskId::new(),
            Some(TaskId::new()),
            "Desk lamp",
            TaskLogKind::Device,
            Some("Office".to_string()),
        );

        repo.create(log.clone()).await.unwrap();

        let fetched = repo.get_by_task_id(log.task_id).await.unwrap().unwrap();
        assert_eq!(fetched, log);
    }

    #[tokio::test]
    async fn should_persist_finished_result_and_error() {
        let repo = setup().await;
        let mut log = root("Evening");
        repo.create(log.clone()).await.unwrap();

        let err: SceneHubError = DeviceOfflineError {
            identity: "lamp".to_string(),
        }
        .into();
        log.expected_children = 2;
        log.finish(Err(&err), scenehub_domain::time::now());
        repo.update(log.clone()).await.unwrap();

        let fetched = repo.get_by_task_id(log.task_id).await.unwrap().unwrap();
        assert!(fetched.is_terminal());
        assert_eq!(fetched.result, Some(TaskResult::TargetDisconnected));
        assert_eq!(fetched.error.as_deref(), Some("device lamp is offline"));
        assert_eq!(fetched.expected_children, 2);
        assert_eq!(fetched.finished_at, log.finished_at);
    }

    #[tokio::test]
    async fn should_fail_update_of_unknown_log() {
        let repo = setup().await;
        let result = repo.update(root("Ghost")).await;
        assert!(matches!(result, Err(SceneHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_find_children_of_parent_in_creation_order() {
        let repo = setup().await;
        let parent = root("Evening");
        repo.create(parent.clone()).await.unwrap();
        for name in ["first", "second"] {
            let child = TaskLog::new(
                TaskId::new(),
                Some(parent.task_id),
                name,
                TaskLogKind::Device,
                None,
            );
            repo.create(child).await.unwrap();
        }
        repo.create(root("Unrelated")).await.unwrap();

        let children = repo.find_children(parent.task_id).await.unwrap();
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn should_list_most_recent_roots_first() {
        let repo = setup().await;
        for name in ["a", "b", "c"] {
            repo.create(root(name)).await.unwrap();
        }
        repo.create(TaskLog::new(
            TaskId::new(),
            Some(TaskId::new()),
            "child",
            TaskLogKind::Device,
            None,
        ))
        .await
        .unwrap();

        let roots = repo.get_recent_roots(2).await.unwrap();
        let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }
}
