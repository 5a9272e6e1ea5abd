//! In-memory port fakes shared by the app crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::{DeviceOfflineError, NotFoundError, SceneHubError};
use scenehub_domain::id::{DeviceId, SceneId, TaskId};
use scenehub_domain::scene::Scene;
use scenehub_domain::task_log::TaskLog;

use crate::ports::{DeviceControl, DeviceRepository, SceneRepository, TaskLogRepository};

pub fn device(identity: &str) -> Device {
    Device::builder()
        .name(format!("{identity} device"))
        .identity(identity)
        .plugin_id("test")
        .location("Lab")
        .build()
        .unwrap()
}

// ── Scenes ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySceneRepo {
    store: Mutex<HashMap<SceneId, Scene>>,
}

impl InMemorySceneRepo {
    pub fn insert(&self, scene: Scene) {
        self.store.lock().unwrap().insert(scene.id, scene);
    }

    pub fn get(&self, id: SceneId) -> Option<Scene> {
        self.store.lock().unwrap().get(&id).cloned()
    }
}

impl SceneRepository for InMemorySceneRepo {
    fn create(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send {
        self.insert(scene.clone());
        async move { Ok(scene) }
    }

    fn get_by_id(
        &self,
        id: SceneId,
    ) -> impl Future<Output = Result<Option<Scene>, SceneHubError>> + Send {
        let r = self.get(id);
        async move { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        let store = self.store.lock().unwrap();
        let r: Vec<_> = store.values().filter(|s| !s.is_deleted()).cloned().collect();
        async move { Ok(r) }
    }

    fn get_pending_automations(
        &self,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        let store = self.store.lock().unwrap();
        let r: Vec<_> = store
            .values()
            .filter(|s| {
                s.auto_run
                    && s.is_on
                    && !s.is_deleted()
                    && s.has_timing_condition()
                    && s.repeats_on(day.weekday())
            })
            .cloned()
            .collect();
        async move { Ok(r) }
    }

    fn find_automations_by_attribute(
        &self,
        device_id: DeviceId,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Vec<Scene>, SceneHubError>> + Send {
        let store = self.store.lock().unwrap();
        let r: Vec<_> = store
            .values()
            .filter(|s| {
                s.auto_run && !s.is_deleted() && s.references_attribute(device_id, attribute)
            })
            .cloned()
            .collect();
        async move { Ok(r) }
    }

    fn update(&self, scene: Scene) -> impl Future<Output = Result<Scene, SceneHubError>> + Send {
        self.insert(scene.clone());
        async move { Ok(scene) }
    }

    fn set_enabled(
        &self,
        id: SceneId,
        is_on: bool,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r: Result<(), SceneHubError> = match store.get_mut(&id) {
            Some(scene) => {
                scene.is_on = is_on;
                Ok(())
            }
            None => Err(NotFoundError {
                entity: "Scene",
                id: id.to_string(),
            }
            .into()),
        };
        async move { r }
    }

    fn soft_delete(&self, id: SceneId) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(scene) = store.get_mut(&id) {
            scene.deleted_at = Some(scenehub_domain::time::now());
        }
        async move { Ok(()) }
    }
}

// ── Devices ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    store: Mutex<HashMap<DeviceId, Device>>,
}

impl InMemoryDeviceRepo {
    pub fn insert(&self, device: Device) {
        self.store.lock().unwrap().insert(device.id, device);
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async move { Ok(r) }
    }

    fn find_by_identity(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        let store = self.store.lock().unwrap();
        let r = store.values().find(|d| d.identity == identity).cloned();
        async move { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SceneHubError>> + Send {
        let r: Vec<_> = self.store.lock().unwrap().values().cloned().collect();
        async move { Ok(r) }
    }

    fn upsert(&self, device: Device) -> impl Future<Output = Result<Device, SceneHubError>> + Send {
        self.insert(device.clone());
        async move { Ok(device) }
    }
}

// ── Task logs ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTaskLogRepo {
    store: Mutex<Vec<TaskLog>>,
}

impl InMemoryTaskLogRepo {
    pub fn get(&self, task_id: TaskId) -> Option<TaskLog> {
        let store = self.store.lock().unwrap();
        store.iter().find(|l| l.task_id == task_id).cloned()
    }

    pub fn all(&self) -> Vec<TaskLog> {
        self.store.lock().unwrap().clone()
    }

    pub fn roots(&self) -> Vec<TaskLog> {
        let store = self.store.lock().unwrap();
        store
            .iter()
            .filter(|l| l.parent_task_id.is_none())
            .cloned()
            .collect()
    }

    pub fn children(&self, parent: TaskId) -> Vec<TaskLog> {
        let store = self.store.lock().unwrap();
        store
            .iter()
            .filter(|l| l.parent_task_id == Some(parent))
            .cloned()
            .collect()
    }
}

impl TaskLogRepository for InMemoryTaskLogRepo {
    fn create(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        self.store.lock().unwrap().push(log.clone());
        async move { Ok(log) }
    }

    fn get_by_task_id(
        &self,
        task_id: TaskId,
    ) -> impl Future<Output = Result<Option<TaskLog>, SceneHubError>> + Send {
        let r = self.get(task_id);
        async move { Ok(r) }
    }

    fn find_children(
        &self,
        parent_task_id: TaskId,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        let r = self.children(parent_task_id);
        async move { Ok(r) }
    }

    fn get_recent_roots(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TaskLog>, SceneHubError>> + Send {
        let mut r = self.roots();
        r.reverse();
        r.truncate(limit);
        async move { Ok(r) }
    }

    fn update(&self, log: TaskLog) -> impl Future<Output = Result<TaskLog, SceneHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let r: Result<TaskLog, SceneHubError> = match store.iter_mut().find(|l| l.task_id == log.task_id) {
            Some(existing) => {
                *existing = log.clone();
                Ok(log)
            }
            None => Err(NotFoundError {
                entity: "TaskLog",
                id: log.task_id.to_string(),
            }
            .into()),
        };
        async move { r }
    }
}

// ── Device control ─────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeControl {
    values: Mutex<HashMap<(String, AttributeRef), AttributeValue>>,
    offline: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, AttributeCommand)>>,
}

impl FakeControl {
    pub fn set_value(&self, identity: &str, attribute: AttributeRef, value: AttributeValue) {
        self.values
            .lock()
            .unwrap()
            .insert((identity.to_string(), attribute), value);
    }

    pub fn set_offline(&self, identity: &str) {
        self.offline.lock().unwrap().insert(identity.to_string());
    }

    pub fn sent(&self) -> Vec<(String, AttributeCommand)> {
        self.sent.lock().unwrap().clone()
    }
}

impl DeviceControl for FakeControl {
    fn is_online(&self, device: &Device) -> impl Future<Output = bool> + Send {
        let online = !self.offline.lock().unwrap().contains(&device.identity);
        async move { online }
    }

    fn get_attribute(
        &self,
        device: &Device,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Option<AttributeValue>, SceneHubError>> + Send {
        let values = self.values.lock().unwrap();
        let r = values
            .get(&(device.identity.clone(), attribute.clone()))
            .cloned();
        async move { Ok(r) }
    }

    fn set_attribute(
        &self,
        device: &Device,
        command: &AttributeCommand,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        let r: Result<(), SceneHubError> = if self.offline.lock().unwrap().contains(&device.identity) {
            Err(DeviceOfflineError {
                identity: device.identity.clone(),
            }
            .into())
        } else {
            self.set_value(&device.identity, command.target.clone(), command.value.clone());
            self.sent
                .lock()
                .unwrap()
                .push((device.identity.clone(), command.clone()));
            Ok(())
        };
        async move { r }
    }
}
