//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SceneHubError`] via `From`. Adapter errors (database, device transport)
//! are boxed into the [`Storage`](SceneHubError::Storage) and
//! [`Control`](SceneHubError::Control) variants.

use std::time::Duration;

use crate::id::SceneId;

/// Boxed adapter error carried across port boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error for every scenehub operation.
#[derive(Debug, thiserror::Error)]
pub enum SceneHubError {
    /// A domain invariant was violated.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced scene or device does not exist (or was soft-deleted).
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The target device reported itself offline.
    #[error(transparent)]
    DeviceOffline(#[from] DeviceOfflineError),

    /// A scene-control task points back at one of its ancestor scenes.
    #[error(transparent)]
    CyclicSceneReference(#[from] CyclicSceneReferenceError),

    /// A task body did not complete within its time budget.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The entity store failed.
    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    /// The device control transport failed.
    #[error("device control error: {0}")]
    Control(#[source] BoxError),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("scene must contain at least one task")]
    NoTasks,
    #[error("automation scene must contain at least one condition")]
    NoConditions,
    #[error("invalid repeat date {0:?}")]
    InvalidRepeatDate(String),
    #[error("effective window must start before it ends")]
    InvalidTimeWindow,
    #[error("device control task must carry at least one command")]
    NoCommands,
    #[error("device identity must not be empty")]
    EmptyIdentity,
    #[error("only automation scenes can be switched on or off")]
    NotAnAutomation,
}

/// A lookup by id returned nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The device is known but currently unreachable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("device {identity} is offline")]
pub struct DeviceOfflineError {
    pub identity: String,
}

/// Recursive scene control would re-enter a scene already on the call chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scene {scene_id} is already running higher up in this scene chain")]
pub struct CyclicSceneReferenceError {
    pub scene_id: SceneId,
}

/// A bounded operation ran out of time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {elapsed:?}")]
pub struct TimeoutError {
    pub elapsed: Duration,
}

impl SceneHubError {
    /// Wrap an adapter-level storage failure.
    pub fn storage(err: impl Into<BoxError>) -> Self {
        Self::Storage(err.into())
    }

    /// Wrap an adapter-level device transport failure.
    pub fn control(err: impl Into<BoxError>) -> Self {
        Self::Control(err.into())
    }

    /// Whether this error means the target no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err: SceneHubError = NotFoundError {
            entity: "Scene",
            id: "42".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Scene 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn should_display_device_offline() {
        let err: SceneHubError = DeviceOfflineError {
            identity: "lamp-1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "device lamp-1 is offline");
        assert!(!err.is_not_found());
    }

    #[test]
    fn should_box_storage_errors() {
        let io = std::io::Error::other("disk full");
        let err = SceneHubError::storage(io);
        assert!(matches!(err, SceneHubError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn should_convert_validation_error() {
        let err: SceneHubError = ValidationError::NameTooLong { max: 40 }.into();
        assert!(matches!(
            err,
            SceneHubError::Validation(ValidationError::NameTooLong { max: 40 })
        ));
    }
}
