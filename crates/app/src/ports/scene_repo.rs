//! Scene repository port — persistence for scenes with their conditions and tasks.

use std::future::Future;

use chrono::NaiveDate;
use scenehub_domain::attribute::AttributeRef;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::{DeviceId, SceneId};
use scenehub_domain::scene::Scene;

/// Repository for persisting and querying [`Scene`]s.
///
/// Implementations must distinguish "not found" (`Ok(None)` from lookups,
/// [`SceneHubError::NotFound`] from mutations) from internal failures.
pub trait SceneRepository {
    /// Create a new scene in storage.
    fn create(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send;

    /// Get a scene by id, soft-deleted scenes included.
    fn get_by_id(
        &self,
        id: SceneId,
    ) -> impl Future<Output = Result<Option<Scene>, SceneHubError>> + Send;

    /// Get all scenes that are not soft-deleted.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send;

    /// Enabled, non-deleted automations that repeat on `day`'s weekday and
    /// carry at least one timing condition.
    fn get_pending_automations(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send;

    /// Non-deleted automations with a device-status condition watching the
    /// given attribute of the given device.
    fn find_automations_by_attribute(
        &self,
        device_id: DeviceId,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send;

    /// Replace an existing scene, its conditions and its tasks.
    fn update(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send;

    /// Persist the enabled flag of an automation.
    fn set_enabled(
        &self,
        id: SceneId,
        is_on: bool,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;

    /// Mark a scene as deleted without removing it.
    fn soft_delete(&self, id: SceneId) -> impl Future<Output = Result<(), SceneHubError>> + Send;
}

impl<T: SceneRepository + Send + Sync> SceneRepository for std::sync::Arc<T> {
    fn create(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send {
        (**self).create(scene)
    }

    fn get_by_id(
        &self,
        id: SceneId,
    ) -> impl Future<Output = Result<Option<Scene>, SceneHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        (**self).get_all()
    }

    fn get_pending_automations(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        (**self).get_pending_automations(day)
    }

    fn find_automations_by_attribute(
        &self,
        device_id: DeviceId,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        (**self).find_automations_by_attribute(device_id, attribute)
    }

    fn update(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send {
        (**self).update(scene)
    }

    fn set_enabled(
        &self,
        id: SceneId,
        is_on: bool,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        (**self).set_enabled(id, is_on)
    }

    fn soft_delete(&self, id: SceneId) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        (**self).soft_delete(id)
    }
}
