//! Scene condition — a trigger rule of an automation scene.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeRef, AttributeValue, Operator};
use crate::id::{DeviceId, SceneConditionId};

/// One trigger rule belonging to exactly one automation scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCondition {
    pub id: SceneConditionId,
    pub kind: ConditionKind,
}

/// What a condition watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    /// Fires every repeat day at a local time of day.
    Timing { at: NaiveTime },
    /// Fires (or holds) based on a device attribute.
    DeviceStatus {
        device_id: DeviceId,
        attribute: AttributeRef,
        operator: Operator,
        value: AttributeValue,
    },
}

impl SceneCondition {
    /// A timer condition firing at `at` local time.
    #[must_use]
    pub fn timing(at: NaiveTime) -> Self {
        Self {
            id: SceneConditionId::new(),
            kind: ConditionKind::Timing { at },
        }
    }

    /// A condition comparing a device attribute against `value`.
    #[must_use]
    pub fn device_status(
        device_id: DeviceId,
        attribute: AttributeRef,
        operator: Operator,
        value: AttributeValue,
    ) -> Self {
        Self {
            id: SceneConditionId::new(),
            kind: ConditionKind::DeviceStatus {
                device_id,
                attribute,
                operator,
                value,
            },
        }
    }

    #[must_use]
    pub fn is_timing(&self) -> bool {
        matches!(self.kind, ConditionKind::Timing { .. })
    }

    /// Time of day of a timer condition.
    #[must_use]
    pub fn timing_at(&self) -> Option<NaiveTime> {
        match self.kind {
            ConditionKind::Timing { at } => Some(at),
            ConditionKind::DeviceStatus { .. } => None,
        }
    }

    /// Whether this condition watches the given attribute of the given device.
    #[must_use]
    pub fn references(&self, device: DeviceId, target: &AttributeRef) -> bool {
        match &self.kind {
            ConditionKind::DeviceStatus {
                device_id,
                attribute,
                ..
            } => *device_id == device && attribute == target,
            ConditionKind::Timing { .. } => false,
        }
    }
}

impl std::fmt::Display for SceneCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ConditionKind::Timing { at } => write!(f, "timing({at})"),
            ConditionKind::DeviceStatus {
                device_id,
                attribute,
                operator,
                value,
            } => write!(f, "device_status({device_id}, {attribute} {operator} {value})"),
        }
    }
}
