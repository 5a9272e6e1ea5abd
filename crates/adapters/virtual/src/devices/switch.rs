//! Virtual switch — a single `power` attribute (`"on"` / `"off"`).

use std::sync::Mutex;

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;

use super::{INSTANCE, invalid, lock, parse_power, power_value, unknown};
use crate::error::VirtualError;

/// A simulated switch that can be turned on and off.
pub struct VirtualSwitch {
    identity: String,
    power: Mutex<bool>,
}

impl Default for VirtualSwitch {
    fn default() -> Self {
        Self::new("virtual-switch")
    }
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            power: Mutex::new(false),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Produce the [`Device`] descriptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn descriptor(&self) -> Result<Device, SceneHubError> {
        Device::builder()
            .identity(&self.identity)
            .name("Virtual Switch")
            .plugin_id(crate::PLUGIN_ID)
            .location("Hallway")
            .build()
    }

    #[must_use]
    pub fn read(&self, attribute: &AttributeRef) -> Option<AttributeValue> {
        (attribute.instance_id == INSTANCE && attribute.attribute == "power")
            .then(|| power_value(*lock(&self.power)))
    }

    /// Apply a `power` command.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError`] for any other attribute or an unreadable value.
    pub fn write(&self, command: &AttributeCommand) -> Result<Option<AttributeValue>, VirtualError> {
        if command.target.instance_id != INSTANCE || command.target.attribute != "power" {
            return Err(unknown(&self.identity, &command.target));
        }
        let mut power = lock(&self.power);
        let next = parse_power(&command.value, *power).ok_or_else(|| invalid(command))?;
        let changed = *power != next;
        *power = next;
        Ok(changed.then(|| power_value(next)))
    }
}
