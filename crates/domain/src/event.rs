//! Device event — a notification that a device attribute changed.
//!
//! Device integrations publish these on the event bus; the daemon forwards
//! them into the scene manager's attribute-change entrypoint.

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeRef, AttributeValue};
use crate::time::Timestamp;

/// Something that happened on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    AttributeChanged {
        /// Plugin-side device identity.
        identity: String,
        attribute: AttributeRef,
        value: AttributeValue,
        timestamp: Timestamp,
    },
}

impl DeviceEvent {
    /// An attribute change stamped with the current time.
    #[must_use]
    pub fn attribute_changed(
        identity: impl Into<String>,
        attribute: AttributeRef,
        value: AttributeValue,
    ) -> Self {
        Self::AttributeChanged {
            identity: identity.into(),
            attribute,
            value,
            timestamp: crate::time::now(),
        }
    }

    /// Identity of the device the event is about.
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::AttributeChanged { identity, .. } => identity,
        }
    }
}
