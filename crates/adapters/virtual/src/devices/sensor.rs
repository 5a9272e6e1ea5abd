//! Virtual temperature sensor — read-only `temperature` and `humidity`.

use std::sync::Mutex;

use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;

use super::{INSTANCE, invalid, lock, unknown};
use crate::error::VirtualError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Readings {
    temperature: f64,
    humidity: i64,
}

/// A simulated temperature and humidity sensor.
///
/// Scene commands cannot change the readings; [`simulate`](Self::simulate)
/// stands in for the physical world.
pub struct VirtualSensor {
    identity: String,
    readings: Mutex<Readings>,
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self::new("virtual-sensor")
    }
}

impl VirtualSensor {
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            readings: Mutex::new(Readings {
                temperature: 21.5,
                humidity: 45,
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
            .name("Virtual Sensor")
            .plugin_id(crate::PLUGIN_ID)
            .location("Living room")
            .build()
    }

    #[must_use]
    pub fn read(&self, attribute: &AttributeRef) -> Option<AttributeValue> {
        if attribute.instance_id != INSTANCE {
            return None;
        }
        let readings = lock(&self.readings);
        match attribute.attribute.as_str() {
            "temperature" => Some(AttributeValue::Float(readings.temperature)),
            "humidity" => Some(AttributeValue::Int(readings.humidity)),
            _ => None,
        }
    }

    /// Sensors are read-only.
    ///
    /// # Errors
    ///
    /// Always returns [`VirtualError`].
    pub fn write(&self, command: &AttributeCommand) -> Result<Option<AttributeValue>, VirtualError> {
        if self.read(&command.target).is_some() {
            return Err(VirtualError::ReadOnly {
                identity: self.identity.clone(),
                attribute: command.target.clone(),
            });
        }
        Err(unknown(&self.identity, &command.target))
    }

    /// Change a reading as if the environment did.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError`] for an unknown attribute or a non-numeric value.
    pub fn simulate(&self, command: &AttributeCommand) -> Result<Option<AttributeValue>, VirtualError> {
        if command.target.instance_id != INSTANCE {
            return Err(unknown(&self.identity, &command.target));
        }
        let mut readings = lock(&self.readings);
        match (command.target.attribute.as_str(), &command.value) {
            ("temperature", AttributeValue::Float(v)) => {
                readings.temperature = *v;
                Ok(Some(AttributeValue::Float(*v)))
            }
            ("temperature", AttributeValue::Int(v)) => {
                #[allow(clippy::cast_precision_loss)]
                let v = *v as f64;
                readings.temperature = v;
                Ok(Some(AttributeValue::Float(v)))
            }
            ("humidity", AttributeValue::Int(v)) => {
                readings.humidity = *v;
                Ok(Some(AttributeValue::Int(*v)))
            }
            ("temperature" | "humidity", _) => Err(invalid(command)),
            _ => Err(unknown(&self.identity, &command.target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature() -> AttributeRef {
        AttributeRef::new(INSTANCE, "temperature")
    }

    #[test]
    fn should_have_default_readings() {
        let sensor = VirtualSensor::default();
        assert_eq!(sensor.read(&temperature()), Some(AttributeValue::Float(21.5)));
        assert_eq!(
            sensor.read(&AttributeRef::new(INSTANCE, "humidity")),
            Some(AttributeValue::Int(45))
        );
    }

    #[test]
    fn should_reject_commands_as_read_only() {
        let sensor = VirtualSensor::default();
        let command = AttributeCommand::new(temperature(), AttributeValue::Float(30.0));
        assert!(matches!(
            sensor.write(&command),
            Err(VirtualError::ReadOnly { .. })
        ));
    }

    #[test]
    fn should_update_reading_when_simulated() {
        let sensor = VirtualSensor::default();
        let command = AttributeCommand::new(temperature(), AttributeValue::Int(30));
        assert_eq!(
            sensor.simulate(&command).unwrap(),
            Some(AttributeValue::Float(30.0))
        );
        assert_eq!(sensor.read(&temperature()), Some(AttributeValue::Float(30.0)));
    }

    #[test]
    fn should_reject_non_numeric_simulated_reading() {
        let sensor = VirtualSensor::default();
        let command =
            AttributeCommand::new(temperature(), AttributeValue::String("hot".to_string()));
        assert!(matches!(
            sensor.simulate(&command),
            Err(VirtualError::InvalidValue { .. })
        ));
    }
}
