//! Condition evaluator — decides at fire time whether an automation runs.

use chrono::NaiveDateTime;

use scenehub_domain::attribute::{AttributeRef, AttributeValue, Operator};
use scenehub_domain::id::DeviceId;
use scenehub_domain::scene::{ConditionKind, Scene, SceneCondition};

use crate::ports::{DeviceControl, DeviceRepository};

/// Evaluates scene conditions against live device state.
pub struct ConditionEvaluator<'a, D, C> {
    devices: &'a D,
    control: &'a C,
}

impl<'a, D, C> ConditionEvaluator<'a, D, C>
where
    D: DeviceRepository,
    C: DeviceControl,
{
    pub fn new(devices: &'a D, control: &'a C) -> Self {
        Self { devices, control }
    }

    /// Whether `scene` should run at local time `now`.
    ///
    /// `fired_by_timer` is set when the evaluation comes from one of the
    /// scene's own timing conditions firing; under "match any" that alone
    /// satisfies the scene.
    pub async fn is_satisfied(&self, scene: &Scene, fired_by_timer: bool, now: NaiveDateTime) -> bool {
        if !scene.is_on {
            tracing::debug!(scene_id = %scene.id, "scene is off");
            return false;
        }
        if !scene.is_in_effect_window(now) {
            tracing::debug!(scene_id = %scene.id, "outside effective window");
            return false;
        }
        let match_all = scene.is_match_all();
        if !match_all && fired_by_timer {
            return true;
        }
        for condition in scene.conditions.iter().filter(|c| !c.is_timing()) {
            let holds = self.condition_holds(condition).await;
            if !match_all && holds {
                tracing::debug!(scene_id = %scene.id, %condition, "condition satisfied");
                return true;
            }
            if match_all && !holds {
                tracing::debug!(scene_id = %scene.id, %condition, "condition not satisfied");
                return false;
            }
        }
        match_all
    }

    /// Evaluate one condition. Timing conditions never hold on their own.
    pub async fn condition_holds(&self, condition: &SceneCondition) -> bool {
        match &condition.kind {
            ConditionKind::Timing { .. } => false,
            ConditionKind::DeviceStatus {
                device_id,
                attribute,
                operator,
                value,
            } => {
                self.device_status_holds(*device_id, attribute, *operator, value)
                    .await
            }
        }
    }

    async fn device_status_holds(
        &self,
        device_id: DeviceId,
        attribute: &AttributeRef,
        operator: Operator,
        target: &AttributeValue,
    ) -> bool {
        let device = match self.devices.get_by_id(device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                tracing::debug!(%device_id, "condition device not found");
                return false;
            }
            Err(err) => {
                tracing::error!(%device_id, %err, "failed to load condition device");
                return false;
            }
        };
        match self.control.get_attribute(&device, attribute).await {
            Ok(Some(current)) => {
                let holds = operator.compare(&current, target);
                tracing::trace!(%device_id, %attribute, %current, %operator, %target, holds);
                holds
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(%device_id, %attribute, %err, "failed to read attribute");
                false
            }
        }
    }
}
