//! Device — a physical or virtual thing whose attributes scenes read and set.

use serde::{Deserialize, Serialize};

use crate::error::{SceneHubError, ValidationError};
use crate::id::DeviceId;

/// A controllable device known to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Identity assigned by the device plugin; attribute-change
    /// notifications reference devices by this value.
    pub identity: String,
    pub name: String,
    /// Plugin (integration) that owns the device.
    pub plugin_id: String,
    /// Human-readable location, e.g. `"Living room"`.
    pub location: Option<String>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] when the name or identity is empty.
    pub fn validate(&self) -> Result<(), SceneHubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.identity.is_empty() {
            return Err(ValidationError::EmptyIdentity.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    identity: Option<String>,
    name: Option<String>,
    plugin_id: Option<String>,
    location: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<Device, SceneHubError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            identity: self.identity.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            plugin_id: self.plugin_id.unwrap_or_default(),
            location: self.location,
        };
        device.validate()?;
        Ok(device)
    }
}
