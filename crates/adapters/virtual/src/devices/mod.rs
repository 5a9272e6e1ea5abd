//! Virtual device implementations — light, sensor, switch.
//!
//! Each virtual device is addressed by a fixed identity string so that the
//! device store keeps the same record across restarts.

mod light;
mod sensor;
mod switch;

pub use light::VirtualLight;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use std::sync::{Mutex, MutexGuard, PoisonError};

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;

use crate::error::VirtualError;

/// Instance id of the single channel every virtual device exposes.
pub const INSTANCE: u32 = 1;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Light(d) => d.identity(),
            Self::Sensor(d) => d.identity(),
            Self::Switch(d) => d.identity(),
        }
    }

    /// Create the [`Device`] descriptor for registration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn descriptor(&self) -> Result<Device, SceneHubError> {
        match self {
            Self::Light(d) => d.descriptor(),
            Self::Sensor(d) => d.descriptor(),
            Self::Switch(d) => d.descriptor(),
        }
    }

    /// Current value of an attribute, `None` when the device has no such attribute.
    #[must_use]
    pub fn read(&self, attribute: &AttributeRef) -> Option<AttributeValue> {
        match self {
            Self::Light(d) => d.read(attribute),
            Self::Sensor(d) => d.read(attribute),
            Self::Switch(d) => d.read(attribute),
        }
    }

    /// Apply a set-command, returning the new value when it changed.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError`] when the attribute is unknown, read-only, or
    /// the value does not fit it.
    pub fn write(&self, command: &AttributeCommand) -> Result<Option<AttributeValue>, VirtualError> {
        match self {
            Self::Light(d) => d.write(command),
            Self::Sensor(d) => d.write(command),
            Self::Switch(d) => d.write(command),
        }
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn power_value(on: bool) -> AttributeValue {
    AttributeValue::String(if on { "on" } else { "off" }.to_string())
}

/// Resolve a power command against the current state.
///
/// Accepts `"on"`, `"off"`, `"toggle"` and booleans.
fn parse_power(value: &AttributeValue, current: bool) -> Option<bool> {
    match value {
        AttributeValue::Bool(on) => Some(*on),
        AttributeValue::String(s) => match s.as_str() {
            "on" => Some(true),
            "off" => Some(false),
            "toggle" => Some(!current),
            _ => None,
        },
        _ => None,
    }
}

fn unknown(identity: &str, attribute: &AttributeRef) -> VirtualError {
    VirtualError::UnknownAttribute {
        identity: identity.to_string(),
        attribute: attribute.clone(),
    }
}

fn invalid(command: &AttributeCommand) -> VirtualError {
    VirtualError::InvalidValue {
        attribute: command.target.clone(),
        value: command.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::String(v.to_string())
    }

    #[test]
    fn should_parse_power_commands() {
        assert_eq!(parse_power(&s("on"), false), Some(true));
        assert_eq!(parse_power(&s("off"), true), Some(false));
        assert_eq!(parse_power(&s("toggle"), true), Some(false));
        assert_eq!(parse_power(&AttributeValue::Bool(true), false), Some(true));
        assert_eq!(parse_power(&s("dim"), false), None);
        assert_eq!(parse_power(&AttributeValue::Int(1), false), None);
    }
}
