//! Scene task — one action a scene performs when it fires.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeCommand;
use crate::id::{DeviceId, SceneId, SceneTaskId};

/// One action belonging to exactly one scene, run `delay_seconds` after
/// the scene fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTask {
    pub id: SceneTaskId,
    #[serde(default)]
    pub delay_seconds: u64,
    pub action: SceneAction,
}

/// What a scene task does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneAction {
    /// Send attribute set-commands to a smart device.
    ControlDevice {
        device_id: DeviceId,
        commands: Vec<AttributeCommand>,
    },
    /// Run another scene right now.
    ManualRun { scene_id: SceneId },
    /// Switch another automation scene on.
    EnableAutoRun { scene_id: SceneId },
    /// Switch another automation scene off.
    DisableAutoRun { scene_id: SceneId },
}

impl SceneTask {
    #[must_use]
    pub fn new(action: SceneAction) -> Self {
        Self {
            id: SceneTaskId::new(),
            delay_seconds: 0,
            action,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, seconds: u64) -> Self {
        self.delay_seconds = seconds;
        self
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

impl SceneAction {
    /// The scene targeted by a scene-control action.
    #[must_use]
    pub fn target_scene(&self) -> Option<SceneId> {
        match self {
            Self::ControlDevice { .. } => None,
            Self::ManualRun { scene_id }
            | Self::EnableAutoRun { scene_id }
            | Self::DisableAutoRun { scene_id } => Some(*scene_id),
        }
    }

    /// Whether this action switches scene `id` on or off.
    #[must_use]
    pub fn switches(&self, id: SceneId) -> bool {
        matches!(
            self,
            Self::EnableAutoRun { scene_id } | Self::DisableAutoRun { scene_id } if *scene_id == id
        )
    }
}

impl std::fmt::Display for SceneAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControlDevice {
                device_id,
                commands,
            } => write!(f, "control_device({device_id}, {} commands)", commands.len()),
            Self::ManualRun { scene_id } => write!(f, "manual_run({scene_id})"),
            Self::EnableAutoRun { scene_id } => write!(f, "enable_auto_run({scene_id})"),
            Self::DisableAutoRun { scene_id } => write!(f, "disable_auto_run({scene_id})"),
        }
    }
}
