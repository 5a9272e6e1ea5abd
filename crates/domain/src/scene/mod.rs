//! Scene — a user-defined automation or manual action bundle.
//!
//! A manual scene (`auto_run == false`) is just an ordered list of
//! [`SceneTask`]s run on demand. An automation scene additionally carries
//! [`SceneCondition`]s, a [`ConditionLogic`], an effective [`TimePeriod`] and
//! a [`Repeat`] policy; its conditions are never consulted for manual scenes.

mod condition;
mod task;

pub use condition::{ConditionKind, SceneCondition};
pub use task::{SceneAction, SceneTask};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeRef;
use crate::error::{SceneHubError, ValidationError};
use crate::id::{DeviceId, SceneId};
use crate::time::{Timestamp, weekday_digit};

/// Maximum scene name length, in characters.
pub const NAME_MAX_LENGTH: usize = 40;

/// How the non-timing conditions of a scene combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    MatchAll,
    MatchAny,
}

/// Part of the day during which an automation may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimePeriod {
    #[default]
    AllDay,
    /// Window anchored on its first occurrence and repeated every day.
    Custom {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Days of the week on which an automation may run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Repeat {
    #[default]
    Daily,
    Workday,
    /// Weekday digits, `1` = Monday … `7` = Sunday (`0` also means Sunday).
    Custom { days: String },
}

impl Repeat {
    /// Weekday digit string this policy stands for.
    #[must_use]
    pub fn repeat_date(&self) -> &str {
        match self {
            Self::Daily => "1234567",
            Self::Workday => "12345",
            Self::Custom { days } => days.trim(),
        }
    }

    /// Whether the policy includes `weekday`.
    #[must_use]
    pub fn includes(&self, weekday: Weekday) -> bool {
        let days = self.repeat_date();
        days.contains(weekday_digit(weekday)) || (weekday == Weekday::Sun && days.contains('0'))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let days = self.repeat_date();
        if days.is_empty() || !days.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(ValidationError::InvalidRepeatDate(days.to_string()));
        }
        Ok(())
    }
}

/// A persisted scene with its conditions and tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub creator: Option<String>,
    /// `true` for automations, `false` for manually triggered scenes.
    pub auto_run: bool,
    /// Whether an automation is enabled.
    pub is_on: bool,
    pub condition_logic: ConditionLogic,
    pub time_period: TimePeriod,
    pub repeat: Repeat,
    pub conditions: Vec<SceneCondition>,
    pub tasks: Vec<SceneTask>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Scene {
    /// Create a builder for constructing a [`Scene`].
    #[must_use]
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] when:
    /// - the name is empty or longer than [`NAME_MAX_LENGTH`] characters
    /// - there are no tasks, or a device task carries no command
    /// - a manual scene switches itself on or off
    /// - an automation has no conditions, an invalid repeat date, or an
    ///   effective window that does not start before it ends
    pub fn validate(&self) -> Result<(), SceneHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.name.chars().count() > NAME_MAX_LENGTH {
            return Err(ValidationError::NameTooLong {
                max: NAME_MAX_LENGTH,
            }
            .into());
        }
        if self.tasks.is_empty() {
            return Err(ValidationError::NoTasks.into());
        }
        let empty_command = self.tasks.iter().any(|t| {
            matches!(&t.action, SceneAction::ControlDevice { commands, .. } if commands.is_empty())
        });
        if empty_command {
            return Err(ValidationError::NoCommands.into());
        }
        if !self.auto_run && self.tasks.iter().any(|t| t.action.switches(self.id)) {
            return Err(ValidationError::NotAnAutomation.into());
        }
        if self.auto_run {
            if self.conditions.is_empty() {
                return Err(ValidationError::NoConditions.into());
            }
            self.repeat.validate()?;
            if let TimePeriod::Custom { start, end } = self.time_period {
                if start >= end {
                    return Err(ValidationError::InvalidTimeWindow.into());
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.condition_logic == ConditionLogic::MatchAll
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[must_use]
    pub fn has_timing_condition(&self) -> bool {
        self.conditions.iter().any(SceneCondition::is_timing)
    }

    /// Whether any device-status condition watches the given attribute.
    #[must_use]
    pub fn references_attribute(&self, device: DeviceId, attribute: &AttributeRef) -> bool {
        self.conditions
            .iter()
            .any(|c| c.references(device, attribute))
    }

    /// Whether the automation repeats on `weekday`.
    #[must_use]
    pub fn repeats_on(&self, weekday: Weekday) -> bool {
        self.repeat.includes(weekday)
    }

    /// Whether `now` falls inside the scene's repeat days and effective window.
    ///
    /// A custom window is shifted forward by whole days so that it lines up
    /// with `now`'s day; windows crossing midnight are also matched against
    /// the previous day's occurrence. The repeat days apply to the day an
    /// occurrence starts on.
    #[must_use]
    pub fn is_in_effect_window(&self, now: NaiveDateTime) -> bool {
        match self.time_period {
            TimePeriod::AllDay => self.repeats_on(now.weekday()),
            TimePeriod::Custom { start, end } => {
                if now < start {
                    return false;
                }
                let days = (now - start).num_days();
                [days, days - 1].into_iter().any(|shift| {
                    let delta = TimeDelta::days(shift);
                    match (
                        start.checked_add_signed(delta),
                        end.checked_add_signed(delta),
                    ) {
                        (Some(s), Some(e)) => {
                            s <= now && now <= e && self.repeats_on(s.weekday())
                        }
                        _ => false,
                    }
                })
            }
        }
    }

    /// Local fire times of the timing conditions on `day`, skipping those
    /// earlier than `not_before`.
    #[must_use]
    pub fn timer_fires_on(&self, day: NaiveDate, not_before: NaiveDateTime) -> Vec<NaiveDateTime> {
        self.conditions
            .iter()
            .filter_map(SceneCondition::timing_at)
            .map(|at: NaiveTime| day.and_time(at))
            .filter(|fire| *fire >= not_before)
            .collect()
    }
}

/// Step-by-step builder for [`Scene`].
#[derive(Debug, Default)]
pub struct SceneBuilder {
    id: Option<SceneId>,
    name: Option<String>,
    creator: Option<String>,
    auto_run: bool,
    is_on: Option<bool>,
    condition_logic: ConditionLogic,
    time_period: TimePeriod,
    repeat: Repeat,
    conditions: Vec<SceneCondition>,
    tasks: Vec<SceneTask>,
    created_at: Option<Timestamp>,
    deleted_at: Option<Timestamp>,
}

impl SceneBuilder {
    #[must_use]
    pub fn id(mut self, id: SceneId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    #[must_use]
    pub fn auto_run(mut self, auto_run: bool) -> Self {
        self.auto_run = auto_run;
        self
    }

    #[must_use]
    pub fn is_on(mut self, is_on: bool) -> Self {
        self.is_on = Some(is_on);
        self
    }

    #[must_use]
    pub fn condition_logic(mut self, logic: ConditionLogic) -> Self {
        self.condition_logic = logic;
        self
    }

    #[must_use]
    pub fn time_period(mut self, period: TimePeriod) -> Self {
        self.time_period = period;
        self
    }

    #[must_use]
    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: SceneCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn task(mut self, task: SceneTask) -> Self {
        self.tasks.push(task);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    #[must_use]
    pub fn deleted_at(mut self, ts: Timestamp) -> Self {
        self.deleted_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`Scene`].
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Validation`] if invariants fail.
    pub fn build(self) -> Result<Scene, SceneHubError> {
        let scene = Scene {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            creator: self.creator,
            auto_run: self.auto_run,
            is_on: self.is_on.unwrap_or(true),
            condition_logic: self.condition_logic,
            time_period: self.time_period,
            repeat: self.repeat,
            conditions: self.conditions,
            tasks: self.tasks,
            created_at: self.created_at.unwrap_or_else(crate::time::now),
            deleted_at: self.deleted_at,
        };
        scene.validate()?;
        Ok(scene)
    }
}
