//! Scene service — use-cases for managing scenes and reading their audit trail.

use std::collections::HashMap;

use scenehub_domain::error::{NotFoundError, SceneHubError};
use scenehub_domain::id::{SceneId, TaskId};
use scenehub_domain::scene::Scene;
use scenehub_domain::task_log::TaskLog;

use crate::manager::SceneManager;
use crate::ports::{DeviceControl, DeviceRepository, SceneRepository, TaskLogRepository};

/// A task log with the logs of the tasks it dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLogNode {
    pub log: TaskLog,
    pub children: Vec<TaskLogNode>,
}

impl TaskLogNode {
    fn assemble(log: TaskLog, children: &mut HashMap<TaskId, Vec<TaskLog>>) -> Self {
        let direct = children.remove(&log.task_id).unwrap_or_default();
        Self {
            children: direct
                .into_iter()
                .map(|child| Self::assemble(child, children))
                .collect(),
            log,
        }
    }
}

/// Application service for scene CRUD and execution.
pub struct SceneService<S, D, L, C> {
    scenes: S,
    task_logs: L,
    manager: SceneManager<S, D, L, C>,
}

impl<S, D, L, C> SceneService<S, D, L, C>
where
    S: SceneRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
    L: TaskLogRepository + Send + Sync + 'static,
    C: DeviceControl + Send + Sync + 'static,
{
    /// Create a new service on top of the repositories and the running manager.
    pub fn new(scenes: S, task_logs: L, manager: SceneManager<S, D, L, C>) -> Self {
        Self {
            scenes,
            task_logs,
            manager,
        }
    }

    /// Create a scene, scheduling it right away when it is an enabled
    /// automation. Manual scenes only run when executed.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, scene), fields(scene_name = %scene.name))]
    pub async fn create_scene(&self, scene: Scene) -> Result<Scene, SceneHubError> {
        scene.validate()?;
        let scene = self.scenes.create(scene).await?;
        if scene.auto_run && scene.is_on {
            self.manager.add_scene_task(&scene);
        }
        Ok(scene)
    }

    /// Look up a live scene by id.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::NotFound`] when no scene with `id` exists or
    /// it was deleted, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_scene(&self, id: SceneId) -> Result<Scene, SceneHubError> {
        self.scenes
            .get_by_id(id)
            .await?
            .filter(|scene| !scene.is_deleted())
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Scene",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// List all live scenes.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_scenes(&self) -> Result<Vec<Scene>, SceneHubError> {
        self.scenes.get_all().await
    }

    /// Replace a scene and reschedule it.
    ///
    /// Pending timers computed from the old definition are dropped. An
    /// enabled automation gets today's remaining timers again; a manual scene
    /// is not run.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] if invariants fail,
    /// [`SceneHubError::NotFound`] if the scene does not exist, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self, scene), fields(scene_id = %scene.id))]
    pub async fn update_scene(&self, scene: Scene) -> Result<Scene, SceneHubError> {
        scene.validate()?;
        let existing = self.get_scene(scene.id).await?;
        let scene = self
            .scenes
            .update(Scene {
                created_at: existing.created_at,
                ..scene
            })
            .await?;
        self.manager.delete_scene_task(scene.id);
        if scene.auto_run && scene.is_on {
            self.manager.add_scene_task(&scene);
        }
        Ok(scene)
    }

    /// Soft-delete a scene and drop its scheduled work.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::NotFound`] if the scene does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_scene(&self, id: SceneId) -> Result<(), SceneHubError> {
        self.get_scene(id).await?;
        self.scenes.soft_delete(id).await?;
        self.manager.delete_scene_task(id);
        Ok(())
    }

    /// Run a manual scene, or switch an automation on or off.
    ///
    /// For a manual scene `is_execute == false` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::NotFound`] if the scene does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn execute_scene(&self, id: SceneId, is_execute: bool) -> Result<(), SceneHubError> {
        let scene = self.get_scene(id).await?;
        if scene.auto_run {
            self.scenes.set_enabled(id, is_execute).await?;
        }
        if is_execute {
            self.manager.restart_scene_task(id).await
        } else {
            self.manager.delete_scene_task(id);
            Ok(())
        }
    }

    /// The most recent root task logs, each with its whole task tree.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_task_logs(&self, limit: usize) -> Result<Vec<TaskLogNode>, SceneHubError> {
        let roots = self.task_logs.get_recent_roots(limit).await?;
        let mut children: HashMap<TaskId, Vec<TaskLog>> = HashMap::new();
        let mut frontier: Vec<TaskId> = roots.iter().map(|log| log.task_id).collect();
        while let Some(parent) = frontier.pop() {
            let found = self.task_logs.find_children(parent).await?;
            frontier.extend(found.iter().map(|log| log.task_id));
            children.insert(parent, found);
        }
        Ok(roots
            .into_iter()
            .map(|root| TaskLogNode::assemble(root, &mut children))
            .collect())
    }
}
