//! Device repository port — persistence for known devices.

use std::future::Future;

use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::DeviceId;

/// Repository for persisting and querying [`Device`]s.
pub trait DeviceRepository {
    /// Get a device by its unique identifier.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send;

    /// Find a device by the identity its plugin assigned to it.
    fn find_by_identity(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send;

    /// Get all devices.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SceneHubError>> + Send;

    /// Create the device, or update the one with the same identity while
    /// keeping its id.
    fn upsert(&self, device: Device) -> impl Future<Output = Result<Device, SceneHubError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for std::sync::Arc<T> {
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_identity(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        (**self).find_by_identity(identity)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SceneHubError>> + Send {
        (**self).get_all()
    }

    fn upsert(&self, device: Device) -> impl Future<Output = Result<Device, SceneHubError>> + Send {
        (**self).upsert(device)
    }
}
