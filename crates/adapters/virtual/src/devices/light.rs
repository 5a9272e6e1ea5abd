//! Virtual light — `power` plus a `brightness` percentage.

use std::sync::Mutex;

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;

use super::{INSTANCE, invalid, lock, parse_power, power_value, unknown};
use crate::error::VirtualError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LightState {
    power: bool,
    brightness: i64,
}

/// A simulated dimmable light.
pub struct VirtualLight {
    identity: String,
    state: Mutex<LightState>,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self::new("virtual-light")
    }
}

impl VirtualLight {
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            state: Mutex::new(LightState {
                power: false,
                brightness: 100,
            }),
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
            .name("Virtual Light")
            .plugin_id(crate::PLUGIN_ID)
            .location("Living room")
            .build()
    }

    #[must_use]
    pub fn read(&self, attribute: &AttributeRef) -> Option<AttributeValue> {
        if attribute.instance_id != INSTANCE {
            return None;
        }
        let state = lock(&self.state);
        match attribute.attribute.as_str() {
            "power" => Some(power_value(state.power)),
            "brightness" => Some(AttributeValue::Int(state.brightness)),
            _ => None,
        }
    }

    /// Apply a `power` or `brightness` command. Brightness must be an
    /// integer between 1 and 100.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError`] for any other attribute or an out-of-range value.
    pub fn write(&self, command: &AttributeCommand) -> Result<Option<AttributeValue>, VirtualError> {
        if command.target.instance_id != INSTANCE {
            return Err(unknown(&self.identity, &command.target));
        }
        let mut state = lock(&self.state);
        match command.target.attribute.as_str() {
            "power" => {
                let next = parse_power(&command.value, state.power).ok_or_else(|| invalid(command))?;
                let changed = state.power != next;
                state.power = next;
                Ok(changed.then(|| power_value(next)))
            }
            "brightness" => {
                let next = match command.value {
                    AttributeValue::Int(v) if (1..=100).contains(&v) => v,
                    _ => return Err(invalid(command)),
                };
                let changed = state.brightness != next;
                state.brightness = next;
                Ok(changed.then_some(AttributeValue::Int(next)))
            }
            _ => Err(unknown(&self.identity, &command.target)),
        }
    }
}
