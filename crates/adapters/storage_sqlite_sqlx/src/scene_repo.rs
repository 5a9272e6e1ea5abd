//! `SQLite` implementation of [`SceneRepository`].
//!
//! A scene is one `scenes` row plus its ordered `scene_conditions` and
//! `scene_tasks` rows. Condition and task payloads, the time period and the
//! repeat policy are stored as JSON.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use scenehub_app::ports::SceneRepository;
use scenehub_domain::attribute::AttributeRef;
use scenehub_domain::error::{NotFoundError, SceneHubError};
use scenehub_domain::id::{DeviceId, SceneConditionId, SceneId, SceneTaskId};
use scenehub_domain::scene::{ConditionKind, Scene, SceneAction, SceneCondition, SceneTask};

use crate::error::StorageError;
use crate::time;

fn decode_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Scene row without its conditions and tasks.
struct Wrapper(Scene);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let condition_logic: String = row.try_get("condition_logic")?;
        let time_period: String = row.try_get("time_period")?;
        let repeat: String = row.try_get("repeat_policy")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Self(Scene {
            id: SceneId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            name: row.try_get("name")?,
            creator: row.try_get("creator")?,
            auto_run: row.try_get("auto_run")?,
            is_on: row.try_get("is_on")?,
            condition_logic: decode_json(&condition_logic)?,
            time_period: decode_json(&time_period)?,
            repeat: decode_json(&repeat)?,
            conditions: Vec::new(),
            tasks: Vec::new(),
            created_at: time::decode(&created_at)?,
            deleted_at: time::decode_opt(row.try_get("deleted_at")?)?,
        }))
    }
}

struct ConditionWrapper(SceneCondition);

impl<'r> FromRow<'r, SqliteRow> for ConditionWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let data: String = row.try_get("data")?;
        Ok(Self(SceneCondition {
            id: SceneConditionId::from_str(&id)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            kind: decode_json(&data)?,
        }))
    }
}

struct TaskWrapper(SceneTask);

impl<'r> FromRow<'r, SqliteRow> for TaskWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let delay_seconds: i64 = row.try_get("delay_seconds")?;
        let action: String = row.try_get("action")?;
        Ok(Self(SceneTask {
            id: SceneTaskId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            delay_seconds: u64::try_from(delay_seconds)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            action: decode_json::<SceneAction>(&action)?,
        }))
    }
}

const INSERT_SCENE: &str = "INSERT INTO scenes (id, name, creator, auto_run, is_on, condition_logic, time_period, repeat_policy, created_at, deleted_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";
const UPDATE_SCENE: &str = "UPDATE scenes SET name = ?, creator = ?, auto_run = ?, is_on = ?, condition_logic = ?, time_period = ?, repeat_policy = ? \
     WHERE id = ? AND deleted_at IS NULL";
const INSERT_CONDITION: &str = "INSERT INTO scene_conditions (id, scene_id, position, kind, device_id, data) VALUES (?, ?, ?, ?, ?, ?)";
const INSERT_TASK: &str = "INSERT INTO scene_tasks (id, scene_id, position, delay_seconds, action) VALUES (?, ?, ?, ?, ?)";
const DELETE_CONDITIONS: &str = "DELETE FROM scene_conditions WHERE scene_id = ?";
const DELETE_TASKS: &str = "DELETE FROM scene_tasks WHERE scene_id = ?";
const SELECT_BY_ID: &str = "SELECT * FROM scenes WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM scenes WHERE deleted_at IS NULL ORDER BY created_at";
const SELECT_PENDING: &str = "SELECT * FROM scenes WHERE auto_run = 1 AND is_on = 1 AND deleted_at IS NULL \
     AND EXISTS (SELECT 1 FROM scene_conditions c WHERE c.scene_id = scenes.id AND c.kind = 'timing') \
     ORDER BY created_at";
const SELECT_BY_DEVICE: &str = "SELECT * FROM scenes WHERE auto_run = 1 AND deleted_at IS NULL \
     AND id IN (SELECT scene_id FROM scene_conditions WHERE device_id = ?) \
     ORDER BY created_at";
const SELECT_CONDITIONS: &str = "SELECT * FROM scene_conditions WHERE scene_id = ? ORDER BY position";
const SELECT_TASKS: &str = "SELECT * FROM scene_tasks WHERE scene_id = ? ORDER BY position";
const SET_ENABLED: &str = "UPDATE scenes SET is_on = ? WHERE id = ? AND deleted_at IS NULL";
const SOFT_DELETE: &str = "UPDATE scenes SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL";

fn condition_kind(kind: &ConditionKind) -> (&'static str, Option<DeviceId>) {
    match kind {
        ConditionKind::Timing { .. } => ("timing", None),
        ConditionKind::DeviceStatus { device_id, .. } => ("device_status", Some(*device_id)),
    }
}

fn position(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

fn scene_not_found(id: SceneId) -> SceneHubError {
    NotFoundError {
        entity: "Scene",
        id: id.to_string(),
    }
    .into()
}

async fn insert_children(conn: &mut SqliteConnection, scene: &Scene) -> Result<(), StorageError> {
    let scene_id = scene.id.to_string();
    for (index, condition) in scene.conditions.iter().enumerate() {
        let (kind, device_id) = condition_kind(&condition.kind);
        sqlx::query(INSERT_CONDITION)
            .bind(condition.id.to_string())
            .bind(&scene_id)
            .bind(position(index))
            .bind(kind)
            .bind(device_id.map(|id| id.to_string()))
            .bind(serde_json::to_string(&condition.kind)?)
            .execute(&mut *conn)
            .await?;
    }
    for (index, task) in scene.tasks.iter().enumerate() {
        sqlx::query(INSERT_TASK)
            .bind(task.id.to_string())
            .bind(&scene_id)
            .bind(position(index))
            .bind(i64::try_from(task.delay_seconds).unwrap_or(i64::MAX))
            .bind(serde_json::to_string(&task.action)?)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// `SQLite`-backed scene repository.
#[derive(Clone)]
pub struct SqliteSceneRepository {
    pool: SqlitePool,
}

impl SqliteSceneRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, Wrapper(mut scene): Wrapper) -> Result<Scene, StorageError> {
        let conditions: Vec<ConditionWrapper> = sqlx::query_as(SELECT_CONDITIONS)
            .bind(scene.id.to_string())
            .fetch_all(&self.pool)
            .await?;
        let tasks: Vec<TaskWrapper> = sqlx::query_as(SELECT_TASKS)
            .bind(scene.id.to_string())
            .fetch_all(&self.pool)
            .await?;
        scene.conditions = conditions.into_iter().map(|c| c.0).collect();
        scene.tasks = tasks.into_iter().map(|t| t.0).collect();
        Ok(scene)
    }

    async fn hydrate_all(&self, rows: Vec<Wrapper>) -> Result<Vec<Scene>, StorageError> {
        let mut scenes = Vec::with_capacity(rows.len());
        for row in rows {
            scenes.push(self.hydrate(row).await?);
        }
        Ok(scenes)
    }
}

impl SceneRepository for SqliteSceneRepository {
    async fn create(&self, scene: Scene) -> Result<Scene, SceneHubError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query(INSERT_SCENE)
            .bind(scene.id.to_string())
            .bind(&scene.name)
            .bind(&scene.creator)
            .bind(scene.auto_run)
            .bind(scene.is_on)
            .bind(serde_json::to_string(&scene.condition_logic).map_err(StorageError::from)?)
            .bind(serde_json::to_string(&scene.time_period).map_err(StorageError::from)?)
            .bind(serde_json::to_string(&scene.repeat).map_err(StorageError::from)?)
            .bind(time::encode(scene.created_at))
            .bind(scene.deleted_at.map(time::encode))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        insert_children(&mut tx, &scene).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(scene)
    }

    async fn get_by_id(&self, id: SceneId) -> Result<Option<Scene>, SceneHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<Scene>, SceneHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(self.hydrate_all(rows).await?)
    }

    async fn get_pending_automations(&self, day: NaiveDate) -> Result<Vec<Scene>, SceneHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PENDING)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let mut scenes = self.hydrate_all(rows).await?;
        scenes.retain(|scene| scene.repeats_on(day.weekday()));
        Ok(scenes)
    }

    async fn find_automations_by_attribute(
        &self,
        device_id: DeviceId,
        attribute: &AttributeRef,
    ) -> Result<Vec<Scene>, SceneHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_DEVICE)
            .bind(device_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let mut scenes = self.hydrate_all(rows).await?;
        scenes.retain(|scene| scene.references_attribute(device_id, attribute));
        Ok(scenes)
    }

    async fn update(&self, scene: Scene) -> Result<Scene, SceneHubError> {
        let scene_id = scene.id.to_string();
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let updated = sqlx::query(UPDATE_SCENE)
            .bind(&scene.name)
            .bind(&scene.creator)
            .bind(scene.auto_run)
            .bind(scene.is_on)
            .bind(serde_json::to_string(&scene.condition_logic).map_err(StorageError::from)?)
            .bind(serde_json::to_string(&scene.time_period).map_err(StorageError::from)?)
            .bind(serde_json::to_string(&scene.repeat).map_err(StorageError::from)?)
            .bind(&scene_id)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        if updated.rows_affected() == 0 {
            return Err(scene_not_found(scene.id));
        }
        for statement in [DELETE_CONDITIONS, DELETE_TASKS] {
            sqlx::query(statement)
                .bind(&scene_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        insert_children(&mut tx, &scene).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(scene)
    }

    async fn set_enabled(&self, id: SceneId, is_on: bool) -> Result<(), SceneHubError> {
        let updated = sqlx::query(SET_ENABLED)
            .bind(is_on)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if updated.rows_affected() == 0 {
            return Err(scene_not_found(id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: SceneId) -> Result<(), SceneHubError> {
        sqlx::query(SOFT_DELETE)
            .bind(time::encode(scenehub_domain::time::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use chrono::NaiveTime;
    use scenehub_domain::attribute::{AttributeCommand, AttributeValue, Operator};
    use scenehub_domain::scene::{ConditionLogic, Repeat};

    async fn setup() -> SqliteSceneRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteSceneRepository::new(db.pool().clone())
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn power() -> AttributeRef {
        AttributeRef::new(1, "power")
    }

    fn automation(device: DeviceId) -> Scene {
        Scene::builder()
            .name("Morning")
            .auto_run(true)
            .condition_logic(ConditionLogic::MatchAny)
            .repeat(Repeat::Workday)
            .condition(SceneCondition::timing(at(8, 30)))
            .condition(SceneCondition::device_status(
                device,
                power(),
                Operator::Eq,
                AttributeValue::String("on".to_string()),
            ))
            .task(
                SceneTask::new(SceneAction::ControlDevice {
                    device_id: device,
                    commands: vec![AttributeCommand::new(
                        AttributeRef::new(1, "brightness"),
                        AttributeValue::Int(80),
                    )],
                })
                .with_delay(5),
            )
            .build()
            .unwrap()
    }

    fn manual() -> Scene {
        Scene::builder()
            .name("Leave home")
            .task(SceneTask::new(SceneAction::DisableAutoRun {
                scene_id: SceneId::new(),
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_scene_with_children() {
        let repo = setup().await;
        let scene = automation(DeviceId::new());

        repo.create(scene.clone()).await.unwrap();

        let fetched = repo.get_by_id(scene.id).await.unwrap().unwrap();
        assert_eq!(fetched.conditions, scene.conditions);
        assert_eq!(fetched.tasks, scene.tasks);
        assert_eq!(fetched.repeat, Repeat::Workday);
        assert_eq!(fetched.condition_logic, ConditionLogic::MatchAny);
        assert_eq!(fetched.tasks[0].delay_seconds, 5);
    }

    #[tokio::test]
    async fn should_return_none_when_scene_not_found() {
        let repo = setup().await;
        assert!(repo.get_by_id(SceneId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_hide_soft_deleted_scene_from_lists_but_not_from_lookup() {
        let repo = setup().await;
        let scene = repo.create(manual()).await.unwrap();
        repo.create(automation(DeviceId::new())).await.unwrap();

        repo.soft_delete(scene.id).await.unwrap();

        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        let fetched = repo.get_by_id(scene.id).await.unwrap().unwrap();
        assert!(fetched.is_deleted());
    }

    #[tokio::test]
    async fn should_list_pending_automations_for_repeat_day_only() {
        let repo = setup().await;
        let scene = repo.create(automation(DeviceId::new())).await.unwrap();
        repo.create(manual()).await.unwrap();
        // 2026-10-16 is a Friday, 2026-10-17 a Saturday.
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let pending = repo.get_pending_automations(friday).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, scene.id);
        assert!(repo.get_pending_automations(saturday).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_not_list_disabled_automation_as_pending() {
        let repo = setup().await;
        let scene = repo.create(automation(DeviceId::new())).await.unwrap();
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        repo.set_enabled(scene.id, false).await.unwrap();

        assert!(repo.get_pending_automations(friday).await.unwrap().is_empty());
        assert!(!repo.get_by_id(scene.id).await.unwrap().unwrap().is_on);
    }

    #[tokio::test]
    async fn should_find_automations_watching_attribute() {
        let repo = setup().await;
        let device = DeviceId::new();
        let scene = repo.create(automation(device)).await.unwrap();
        repo.create(automation(DeviceId::new())).await.unwrap();

        let found = repo
            .find_automations_by_attribute(device, &power())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scene.id);

        let other = repo
            .find_automations_by_attribute(device, &AttributeRef::new(1, "brightness"))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn should_replace_children_on_update() {
        let repo = setup().await;
        let mut scene = repo.create(automation(DeviceId::new())).await.unwrap();

        scene.name = "Late morning".to_string();
        scene.conditions.truncate(1);
        repo.update(scene.clone()).await.unwrap();

        let fetched = repo.get_by_id(scene.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Late morning");
        assert_eq!(fetched.conditions.len(), 1);
        assert!(fetched.conditions[0].is_timing());
    }

    #[tokio::test]
    async fn should_fail_update_and_enable_of_unknown_scene() {
        let repo = setup().await;
        assert!(matches!(
            repo.update(manual()).await,
            Err(SceneHubError::NotFound(_))
        ));
        assert!(matches!(
            repo.set_enabled(SceneId::new(), true).await,
            Err(SceneHubError::NotFound(_))
        ));
    }
}
