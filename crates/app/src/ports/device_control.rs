//! Device control port — read and write live device attributes.
//!
//! Implemented by device integrations (e.g. `adapter_virtual`). The scene
//! engine never talks to device transports directly.

use std::future::Future;

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;

/// Client for the plugin that owns a device.
pub trait DeviceControl {
    /// Whether the device is currently reachable.
    fn is_online(&self, device: &Device) -> impl Future<Output = bool> + Send;

    /// Current value of one attribute, `None` when the device does not
    /// expose it.
    fn get_attribute(
        &self,
        device: &Device,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Option<AttributeValue>, SceneHubError>> + Send;

    /// Apply one set-command to the device.
    fn set_attribute(
        &self,
        device: &Device,
        command: &AttributeCommand,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;
}

impl<T: DeviceControl + Send + Sync> DeviceControl for std::sync::Arc<T> {
    fn is_online(&self, device: &Device) -> impl Future<Output = bool> + Send {
        (**self).is_online(device)
    }

    fn get_attribute(
        &self,
        device: &Device,
        attribute: &AttributeRef,
    ) -> impl Future<Output = Result<Option<AttributeValue>, SceneHubError>> + Send {
        (**self).get_attribute(device, attribute)
    }

    fn set_attribute(
        &self,
        device: &Device,
        command: &AttributeCommand,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send {
        (**self).set_attribute(device, command)
    }
}
