//! # scenehub-adapter-virtual
//!
//! Virtual/demo integration that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Identity | Attributes (instance 1) |
//! |--------|----------|-------------------------|
//! | Virtual Light | `virtual-light` | `power` (`on` / `off` / `toggle`), `brightness` (1-100) |
//! | Virtual Sensor | `virtual-sensor` | `temperature`, `humidity` (read-only) |
//! | Virtual Switch | `virtual-switch` | `power` (`on` / `off` / `toggle`) |
//!
//! Every applied change is published as a [`DeviceEvent`] so that automation
//! scenes react to it like they would to a physical device.
//!
//! ## Dependency rule
//!
//! Depends on `scenehub-app` (port traits) and `scenehub-domain` only.

mod devices;
mod error;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use scenehub_app::ports::{DeviceControl, EventPublisher};
use scenehub_domain::attribute::{AttributeCommand, AttributeRef, AttributeValue};
use scenehub_domain::device::Device;
use scenehub_domain::error::{DeviceOfflineError, NotFoundError, SceneHubError};
use scenehub_domain::event::DeviceEvent;

pub use devices::INSTANCE;
use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};
pub use error::VirtualError;

/// Plugin id stamped on every device this integration provides.
pub const PLUGIN_ID: &str = "virtual";

/// Virtual integration that creates simulated devices.
pub struct VirtualIntegration<P> {
    devices: HashMap<String, VirtualDevice>,
    offline: Mutex<HashSet<String>>,
    publisher: P,
}

impl<P> VirtualIntegration<P> {
    /// Create the integration with its light, sensor and switch.
    pub fn new(publisher: P) -> Self {
        let devices = [
            VirtualDevice::Light(VirtualLight::default()),
            VirtualDevice::Sensor(VirtualSensor::default()),
            VirtualDevice::Switch(VirtualSwitch::default()),
        ]
        .into_iter()
        .map(|device| (device.identity().to_string(), device))
        .collect();

        Self {
            devices,
            offline: Mutex::new(HashSet::new()),
            publisher,
        }
    }

    /// Descriptors of every provided device, ready to be upserted into the
    /// device repository.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a descriptor cannot be built.
    pub fn devices(&self) -> Result<Vec<Device>, SceneHubError> {
        let mut devices = self
            .devices
            .values()
            .map(VirtualDevice::descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        devices.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(devices)
    }

    /// Check whether this integration owns the given device.
    #[must_use]
    pub fn owns_device(&self, identity: &str) -> bool {
        self.devices.contains_key(identity)
    }

    /// Simulate the device dropping off (or coming back on) the network.
    pub fn set_online(&self, identity: &str, online: bool) {
        let mut offline = self.offline.lock().unwrap_or_else(PoisonError::into_inner);
        if online {
            offline.remove(identity);
        } else {
            offline.insert(identity.to_string());
        }
    }

    fn is_reachable(&self, identity: &str) -> bool {
        self.owns_device(identity)
            && !self
                .offline
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(identity)
    }

    fn find(&self, identity: &str) -> Result<&VirtualDevice, SceneHubError> {
        self.devices.get(identity).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: identity.to_string(),
            }
            .into()
        })
    }
}

impl<P: EventPublisher + Sync> VirtualIntegration<P> {
    /// Change a sensor reading as if the environment did, and publish the
    /// resulting event.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unknown, is not a sensor, or the
    /// value does not fit the attribute.
    pub async fn simulate(
        &self,
        identity: &str,
        attribute: AttributeRef,
        value: AttributeValue,
    ) -> Result<(), SceneHubError> {
        let command = AttributeCommand::new(attribute, value);
        let changed = match self.find(identity)? {
            VirtualDevice::Sensor(sensor) => sensor.simulate(&command)?,
            other => other.write(&command)?,
        };
        self.notify(identity, command.target, changed).await
    }

    async fn notify(
        &self,
        identity: &str,
        attribute: AttributeRef,
        changed: Option<AttributeValue>,
    ) -> Result<(), SceneHubError> {
        let Some(value) = changed else {
            return Ok(());
        };
        tracing::debug!(identity, %attribute, %value, "virtual attribute changed");
        self.publisher
            .publish(DeviceEvent::attribute_changed(identity, attribute, value))
            .await
    }
}

impl<P: EventPublisher + Send + Sync> DeviceControl for VirtualIntegration<P> {
    async fn is_online(&self, device: &Device) -> bool {
        self.is_reachable(&device.identity)
    }

    async fn get_attribute(
        &self,
        device: &Device,
        attribute: &AttributeRef,
    ) -> Result<Option<AttributeValue>, SceneHubError> {
        Ok(self.find(&device.identity)?.read(attribute))
    }

    async fn set_attribute(
        &self,
        device: &Device,
        command: &AttributeCommand,
    ) -> Result<(), SceneHubError> {
        let target = self.find(&device.identity)?;
        if !self.is_reachable(&device.identity) {
            return Err(DeviceOfflineError {
                identity: device.identity.clone(),
            }
            .into());
        }
        let changed = target.write(command)?;
        self.notify(&device.identity, command.target.clone(), changed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenehub_app::event_bus::InProcessEventBus;

    fn setup() -> (VirtualIntegration<InProcessEventBus>, InProcessEventBus) {
        let bus = InProcessEventBus::new(16);
        (VirtualIntegration::new(bus.clone()), bus)
    }

    fn device(integration: &VirtualIntegration<InProcessEventBus>, identity: &str) -> Device {
        integration
            .devices()
            .unwrap()
            .into_iter()
            .find(|d| d.identity == identity)
            .unwrap()
    }

    fn power(value: &str) -> AttributeCommand {
        AttributeCommand::new(
            AttributeRef::new(INSTANCE, "power"),
            AttributeValue::String(value.to_string()),
        )
    }

    #[test]
    fn should_provide_three_devices() {
        let (integration, _) = setup();
        let devices = integration.devices().unwrap();
        let identities: Vec<&str> = devices.iter().map(|d| d.identity.as_str()).collect();
        assert_eq!(
            identities,
            vec!["virtual-light", "virtual-sensor", "virtual-switch"]
        );
        assert!(devices.iter().all(|d| d.plugin_id == PLUGIN_ID));
    }

    #[tokio::test]
    async fn should_turn_on_light_and_publish_event() {
        let (integration, bus) = setup();
        let mut rx = bus.subscribe();
        let light = device(&integration, "virtual-light");

        integration.set_attribute(&light, &power("on")).await.unwrap();

        let value = integration
            .get_attribute(&light, &AttributeRef::new(INSTANCE, "power"))
            .await
            .unwrap();
        assert_eq!(value, Some(AttributeValue::String("on".to_string())));

        let DeviceEvent::AttributeChanged {
            identity,
            attribute,
            value,
            ..
        } = rx.recv().await.unwrap();
        assert_eq!(identity, "virtual-light");
        assert_eq!(attribute, AttributeRef::new(INSTANCE, "power"));
        assert_eq!(value, AttributeValue::String("on".to_string()));
    }

    #[tokio::test]
    async fn should_not_publish_when_nothing_changed() {
        let (integration, bus) = setup();
        let mut rx = bus.subscribe();
        let switch = device(&integration, "virtual-switch");

        integration.set_attribute(&switch, &power("off")).await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_toggle_switch() {
        let (integration, _) = setup();
        let switch = device(&integration, "virtual-switch");

        integration.set_attribute(&switch, &power("toggle")).await.unwrap();

        let value = integration
            .get_attribute(&switch, &AttributeRef::new(INSTANCE, "power"))
            .await
            .unwrap();
        assert_eq!(value, Some(AttributeValue::String("on".to_string())));
    }

    #[tokio::test]
    async fn should_refuse_commands_while_offline() {
        let (integration, _) = setup();
        let switch = device(&integration, "virtual-switch");

        integration.set_online("virtual-switch", false);
        assert!(!integration.is_online(&switch).await);
        let result = integration.set_attribute(&switch, &power("on")).await;
        assert!(matches!(result, Err(SceneHubError::DeviceOffline(_))));

        integration.set_online("virtual-switch", true);
        assert!(integration.is_online(&switch).await);
        integration.set_attribute(&switch, &power("on")).await.unwrap();
    }

    #[tokio::test]
    async fn should_report_control_error_for_read_only_sensor() {
        let (integration, _) = setup();
        let sensor = device(&integration, "virtual-sensor");
        let command = AttributeCommand::new(
            AttributeRef::new(INSTANCE, "temperature"),
            AttributeValue::Float(30.0),
        );

        let result = integration.set_attribute(&sensor, &command).await;
        assert!(matches!(result, Err(SceneHubError::Control(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_for_foreign_device() {
        let (integration, _) = setup();
        let foreign = Device::builder()
            .identity("zigbee-1")
            .name("Lamp")
            .plugin_id("zigbee")
            .build()
            .unwrap();

        assert!(!integration.is_online(&foreign).await);
        let result = integration.set_attribute(&foreign, &power("on")).await;
        assert!(matches!(result, Err(SceneHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_publish_simulated_sensor_reading() {
        let (integration, bus) = setup();
        let mut rx = bus.subscribe();

        integration
            .simulate(
                "virtual-sensor",
                AttributeRef::new(INSTANCE, "temperature"),
                AttributeValue::Float(27.0),
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.identity(), "virtual-sensor");
    }
}
