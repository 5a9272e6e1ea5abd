//! Errors raised by virtual devices.

use scenehub_domain::attribute::{AttributeRef, AttributeValue};
use scenehub_domain::error::SceneHubError;

/// A command a virtual device cannot apply.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    #[error("device {identity} has no attribute {attribute}")]
    UnknownAttribute {
        identity: String,
        attribute: AttributeRef,
    },

    #[error("attribute {attribute} of device {identity} is read-only")]
    ReadOnly {
        identity: String,
        attribute: AttributeRef,
    },

    #[error("invalid value {value} for attribute {attribute}")]
    InvalidValue {
        attribute: AttributeRef,
        value: AttributeValue,
    },
}

impl From<VirtualError> for SceneHubError {
    fn from(err: VirtualError) -> Self {
        Self::control(err)
    }
}
