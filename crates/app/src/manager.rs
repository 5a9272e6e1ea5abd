//! Scene manager — turns scenes into scheduled task trees and fires them.
//!
//! The manager owns the [`Scheduler`] and every collaborator the task bodies
//! need. It is cheap to clone; clones share the same queue.
//!
//! A scene firing is one task. When its body runs it re-reads the scene,
//! evaluates the conditions of automations and dispatches one child task per
//! scene task, offset by that task's delay. Device children set attributes;
//! scene-control children switch another automation on or off, or fire
//! another scene as a grandchild. Every task is wrapped with a timeout and
//! with the task-log recorder.
//!
//! Automations with timing conditions only ever have today's fire times in
//! the queue. A self-rescheduling arrange task enqueues the next day's fire
//! times shortly before midnight; once that happened, rescheduling a scene
//! also re-adds its next-day fire times.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use tokio_util::sync::CancellationToken;

use scenehub_domain::attribute::{AttributeCommand, AttributeRef};
use scenehub_domain::error::{
    CyclicSceneReferenceError, DeviceOfflineError, NotFoundError, SceneHubError, ValidationError,
};
use scenehub_domain::id::{DeviceId, SceneId, TaskId};
use scenehub_domain::scene::{Scene, SceneAction, SceneTask};
use scenehub_domain::task_log::TaskLogKind;
use scenehub_domain::time::{Timestamp, local_now, local_to_utc, now};

use crate::condition::ConditionEvaluator;
use crate::config::EngineConfig;
use crate::ports::{DeviceControl, DeviceRepository, SceneRepository, TaskLogRepository};
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskContext, timeout_wrapper};
use crate::task_log::{LogTarget, TaskLogRecorder};

/// What a scene firing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The automation's conditions did not hold; nothing ran.
    Skipped,
    /// This many child tasks were dispatched.
    Dispatched(usize),
}

/// Timer task pending for a scene.
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    task_id: TaskId,
    fire_at: Timestamp,
}

struct Inner<S, D, L, C> {
    scenes: S,
    devices: D,
    control: C,
    recorder: TaskLogRecorder<L>,
    scheduler: Scheduler,
    config: EngineConfig,
    timers: Mutex<HashMap<SceneId, Vec<PendingTimer>>>,
    /// Latest day whose timers were arranged.
    arranged: Mutex<Option<NaiveDate>>,
}

/// Façade of the scene engine.
pub struct SceneManager<S, D, L, C> {
    inner: Arc<Inner<S, D, L, C>>,
}

impl<S, D, L, C> Clone for SceneManager<S, D, L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn scene_not_found(id: SceneId) -> SceneHubError {
    NotFoundError {
        entity: "Scene",
        id: id.to_string(),
    }
    .into()
}

fn device_not_found(id: DeviceId) -> SceneHubError {
    NotFoundError {
        entity: "Device",
        id: id.to_string(),
    }
    .into()
}

impl<S, D, L, C> SceneManager<S, D, L, C>
where
    S: SceneRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
    L: TaskLogRepository + Send + Sync + 'static,
    C: DeviceControl + Send + Sync + 'static,
{
    /// Create a manager. Nothing is scheduled until [`run`](Self::run).
    pub fn new(scenes: S, devices: D, task_logs: L, control: C, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                scenes,
                devices,
                control,
                recorder: TaskLogRecorder::new(Arc::new(task_logs)),
                scheduler: Scheduler::new(&config),
                config,
                timers: Mutex::new(HashMap::new()),
                arranged: Mutex::new(None),
            }),
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<SceneId, Vec<PendingTimer>>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn arranged_after(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.inner
            .arranged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .filter(|day| *day > today)
    }

    fn mark_arranged(&self, day: NaiveDate) {
        let mut arranged = self
            .inner
            .arranged
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if arranged.is_none_or(|last| last < day) {
            *arranged = Some(day);
        }
    }

    /// Number of tasks waiting in the queue.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.scheduler.len()
    }

    /// Arrange today's remaining timers, install the daily arrange task and
    /// drive the scheduler until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("starting scene manager");
        let current = local_now();
        if let Err(err) = self.arrange_day(current.date(), current).await {
            tracing::error!(%err, "failed to arrange today's scene timers");
        }
        self.push_arranger(current.date());
        self.inner.scheduler.run(cancel).await;
        tracing::info!("scene manager stopped");
    }

    /// Schedule a scene's work.
    ///
    /// A manual scene fires right away. An automation gets one timer task per
    /// timing condition still ahead today; earlier ones are left to the daily
    /// arrange task. When the next day was already arranged, its timers are
    /// added as well.
    pub fn add_scene_task(&self, scene: &Scene) {
        if scene.auto_run {
            let current = local_now();
            let mut count = self.schedule_timers(scene, current.date(), current);
            if let Some(day) = self.arranged_after(current.date()) {
                if scene.is_on && !scene.is_deleted() && scene.repeats_on(day.weekday()) {
                    count += self.schedule_timers(scene, day, day.and_time(NaiveTime::MIN));
                }
            }
            tracing::info!(scene_id = %scene.id, timers = count, "automation scheduled");
        } else {
            tracing::info!(scene_id = %scene.id, "manual scene queued");
            let task = self.scene_firing(scene, now(), false, None, Vec::new());
            self.inner.scheduler.push(task);
        }
    }

    /// Load a scene and schedule its work.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::NotFound`] when the scene is missing or
    /// deleted, or a storage error.
    pub async fn add_scene_task_by_id(&self, id: SceneId) -> Result<(), SceneHubError> {
        let scene = self.load_scene(id).await?;
        self.add_scene_task(&scene);
        Ok(())
    }

    /// Drop the scene's pending timer tasks. Runs that already started are
    /// not affected.
    pub fn delete_scene_task(&self, id: SceneId) {
        let pending = self.timers().remove(&id).unwrap_or_default();
        let removed = pending
            .iter()
            .filter(|timer| self.inner.scheduler.remove(timer.task_id))
            .count();
        tracing::info!(scene_id = %id, removed, "scene timers removed");
    }

    /// Delete then re-add a scene's work.
    ///
    /// # Errors
    ///
    /// Same as [`add_scene_task_by_id`](Self::add_scene_task_by_id).
    pub async fn restart_scene_task(&self, id: SceneId) -> Result<(), SceneHubError> {
        self.delete_scene_task(id);
        self.add_scene_task_by_id(id).await
    }

    /// Fire automations watching an attribute that just changed.
    ///
    /// Scenes that match all conditions and also carry a timing condition are
    /// left to their timers. Returns the ids of the scenes queued.
    ///
    /// # Errors
    ///
    /// Returns a storage error when devices or scenes cannot be read.
    pub async fn on_device_attribute_changed(
        &self,
        identity: &str,
        attribute: &AttributeRef,
    ) -> Result<Vec<SceneId>, SceneHubError> {
        let Some(device) = self.inner.devices.find_by_identity(identity).await? else {
            tracing::debug!(identity, %attribute, "attribute changed on unknown device");
            return Ok(Vec::new());
        };
        let scenes = self
            .inner
            .scenes
            .find_automations_by_attribute(device.id, attribute)
            .await?;

        let mut fired = Vec::new();
        for scene in scenes.iter().filter(|s| !s.is_deleted()) {
            if scene.is_match_all() && scene.has_timing_condition() {
                tracing::debug!(scene_id = %scene.id, %attribute, "left to the scene's timer");
                continue;
            }
            let task = self.scene_firing(scene, now(), false, None, Vec::new());
            self.inner.scheduler.push(task);
            fired.push(scene.id);
        }
        tracing::debug!(identity, %attribute, fired = fired.len(), "attribute change handled");
        Ok(fired)
    }

    /// Enqueue the timers of every pending automation for `day`, skipping
    /// fire times before `not_before`. Returns the number of timers added.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the automations cannot be read.
    pub async fn arrange_day(
        &self,
        day: NaiveDate,
        not_before: NaiveDateTime,
    ) -> Result<usize, SceneHubError> {
        let scenes = self.inner.scenes.get_pending_automations(day).await?;
        self.mark_arranged(day);
        let timers: usize = scenes
            .iter()
            .map(|scene| self.schedule_timers(scene, day, not_before))
            .sum();
        tracing::info!(%day, scenes = scenes.len(), timers, "scene timers arranged");
        Ok(timers)
    }

    async fn load_scene(&self, id: SceneId) -> Result<Scene, SceneHubError> {
        self.inner
            .scenes
            .get_by_id(id)
            .await?
            .filter(|scene| !scene.is_deleted())
            .ok_or_else(|| scene_not_found(id))
    }

    async fn load_automation(&self, id: SceneId) -> Result<Scene, SceneHubError> {
        let scene = self.load_scene(id).await?;
        if !scene.auto_run {
            return Err(ValidationError::NotAnAutomation.into());
        }
        Ok(scene)
    }

    fn schedule_timers(&self, scene: &Scene, day: NaiveDate, not_before: NaiveDateTime) -> usize {
        let mut count = 0;
        for local in scene.timer_fires_on(day, not_before) {
            let Some(fire_at) = local_to_utc(local) else {
                tracing::warn!(scene_id = %scene.id, %local, "fire time skipped by clock change");
                continue;
            };
            let mut timers = self.timers();
            let pending = timers.entry(scene.id).or_default();
            if pending.iter().any(|timer| timer.fire_at == fire_at) {
                continue;
            }
            let task = self.scene_firing(scene, fire_at, true, None, Vec::new());
            pending.push(PendingTimer {
                task_id: task.id,
                fire_at,
            });
            drop(timers);
            self.inner.scheduler.push(task);
            count += 1;
        }
        count
    }

    fn forget_timer(&self, scene_id: SceneId, task_id: TaskId) {
        let mut timers = self.timers();
        if let Some(pending) = timers.get_mut(&scene_id) {
            pending.retain(|timer| timer.task_id != task_id);
            if pending.is_empty() {
                timers.remove(&scene_id);
            }
        }
    }

    fn decorate(&self, task: Task, target: LogTarget) -> Task {
        task.with_wrapper(timeout_wrapper(self.inner.config.task_timeout))
            .with_wrapper(self.inner.recorder.wrapper(target))
    }

    /// A task firing `scene` at `fire_at`.
    ///
    /// `chain` holds the scenes already firing above this one.
    fn scene_firing(
        &self,
        scene: &Scene,
        fire_at: Timestamp,
        fired_by_timer: bool,
        parent: Option<TaskId>,
        chain: Vec<SceneId>,
    ) -> Task {
        let manager = self.clone();
        let scene_id = scene.id;
        let mut task = Task::at(fire_at, move |ctx| {
            let manager = manager.clone();
            let chain = chain.clone();
            async move {
                manager
                    .fire_scene(ctx, scene_id, fired_by_timer, chain)
                    .await
                    .map(|_| ())
            }
        })
        .with_label(format!("scene {}", scene.name));
        if let Some(parent) = parent {
            task = task.with_parent(parent);
        }
        self.decorate(task, LogTarget::scene(scene))
    }

    /// Body of a scene firing.
    async fn fire_scene(
        &self,
        ctx: TaskContext,
        scene_id: SceneId,
        fired_by_timer: bool,
        mut chain: Vec<SceneId>,
    ) -> Result<FireOutcome, SceneHubError> {
        if fired_by_timer {
            self.forget_timer(scene_id, ctx.task_id);
        }
        let scene = self.load_scene(scene_id).await?;
        if scene.auto_run {
            let evaluator = ConditionEvaluator::new(&self.inner.devices, &self.inner.control);
            if !evaluator
                .is_satisfied(&scene, fired_by_timer, local_now())
                .await
            {
                tracing::info!(%scene_id, "conditions not satisfied");
                return Ok(FireOutcome::Skipped);
            }
        }

        chain.push(scene.id);
        let mut children = Vec::with_capacity(scene.tasks.len());
        for scene_task in &scene.tasks {
            let target = self.log_target(&scene_task.action).await;
            children.push(self.action_task(ctx.task_id, scene_task, target, &chain));
        }
        let count = u32::try_from(children.len()).unwrap_or(u32::MAX);
        self.inner
            .recorder
            .expect_children(ctx.task_id, count)
            .await?;
        let dispatched = children.len();
        for child in children {
            self.inner.scheduler.push(child);
        }
        tracing::info!(%scene_id, name = %scene.name, dispatched, "scene fired");
        Ok(FireOutcome::Dispatched(dispatched))
    }

    async fn log_target(&self, action: &SceneAction) -> LogTarget {
        match action {
            SceneAction::ControlDevice { device_id, .. } => {
                match self.inner.devices.get_by_id(*device_id).await {
                    Ok(Some(device)) => LogTarget::device(&device),
                    _ => LogTarget::unresolved(TaskLogKind::Device, device_id),
                }
            }
            SceneAction::ManualRun { scene_id }
            | SceneAction::EnableAutoRun { scene_id }
            | SceneAction::DisableAutoRun { scene_id } => {
                match self.inner.scenes.get_by_id(*scene_id).await {
                    Ok(Some(scene)) => LogTarget::scene(&scene),
                    _ => LogTarget::unresolved(TaskLogKind::Scene, scene_id),
                }
            }
        }
    }

    /// Child task running one scene task of a firing.
    fn action_task(
        &self,
        parent: TaskId,
        scene_task: &SceneTask,
        target: LogTarget,
        chain: &[SceneId],
    ) -> Task {
        let manager = self.clone();
        let action = scene_task.action.clone();
        let label = action.to_string();
        let chain = chain.to_vec();
        let task = Task::after(scene_task.delay(), move |ctx| {
            let manager = manager.clone();
            let action = action.clone();
            let chain = chain.clone();
            async move { manager.run_action(ctx, action, chain).await }
        })
        .with_parent(parent)
        .with_label(label);
        self.decorate(task, target)
    }

    /// Body of a scene-task child.
    async fn run_action(
        &self,
        ctx: TaskContext,
        action: SceneAction,
        chain: Vec<SceneId>,
    ) -> Result<(), SceneHubError> {
        match action {
            SceneAction::ControlDevice {
                device_id,
                commands,
            } => self.execute_device(device_id, &commands).await,
            SceneAction::ManualRun { scene_id } => {
                if chain.contains(&scene_id) {
                    return Err(CyclicSceneReferenceError { scene_id }.into());
                }
                let scene = self.load_scene(scene_id).await?;
                self.inner.recorder.expect_children(ctx.task_id, 1).await?;
                let task = self.scene_firing(&scene, now(), false, Some(ctx.task_id), chain);
                self.inner.scheduler.push(task);
                Ok(())
            }
            SceneAction::EnableAutoRun { scene_id } => {
                self.load_automation(scene_id).await?;
                self.inner.scenes.set_enabled(scene_id, true).await?;
                if let Err(err) = self.restart_scene_task(scene_id).await {
                    tracing::warn!(%scene_id, %err, "enabled scene could not be scheduled");
                }
                Ok(())
            }
            SceneAction::DisableAutoRun { scene_id } => {
                self.load_automation(scene_id).await?;
                self.inner.scenes.set_enabled(scene_id, false).await?;
                self.delete_scene_task(scene_id);
                Ok(())
            }
        }
    }

    async fn execute_device(
        &self,
        device_id: DeviceId,
        commands: &[AttributeCommand],
    ) -> Result<(), SceneHubError> {
        let device = self
            .inner
            .devices
            .get_by_id(device_id)
            .await?
            .ok_or_else(|| device_not_found(device_id))?;
        if !self.inner.control.is_online(&device).await {
            return Err(DeviceOfflineError {
                identity: device.identity,
            }
            .into());
        }
        for command in commands {
            tracing::info!(
                %device_id,
                attribute = %command.target,
                value = %command.value,
                "setting device attribute"
            );
            self.inner.control.set_attribute(&device, command).await?;
        }
        Ok(())
    }

    /// Queue the arrange task running on `day` at the configured anchor.
    fn push_arranger(&self, day: NaiveDate) {
        let anchor = day.and_time(self.inner.config.arrange_at);
        let fire_at = local_to_utc(anchor)
            .or_else(|| local_to_utc(anchor + TimeDelta::hours(1)))
            .unwrap_or_else(now);
        let manager = self.clone();
        let task = Task::at(fire_at, move |_| {
            let manager = manager.clone();
            async move {
                manager.arrange_next_day(day).await;
                Ok(())
            }
        })
        .with_label(format!("arrange after {day}"));
        self.inner.scheduler.push(task);
    }

    async fn arrange_next_day(&self, day: NaiveDate) {
        let Some(next) = day.succ_opt() else {
            return;
        };
        if let Err(err) = self.arrange_day(next, next.and_time(NaiveTime::MIN)).await {
            tracing::error!(%next, %err, "failed to arrange scene timers");
        }
        self.push_arranger(next);
    }
}

impl<S, D, L, C> std::fmt::Debug for SceneManager<S, D, L, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneManager")
            .field("scheduler", &self.inner.scheduler)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
