//! Task log — the append-only audit trail of scene and device executions.
//!
//! Every executed task writes one [`TaskLog`] keyed by its [`TaskId`]. Logs
//! of tasks dispatched by another task point at their parent, forming a tree
//! whose inner nodes derive their result from their children.

use serde::{Deserialize, Serialize};

use crate::error::SceneHubError;
use crate::id::TaskId;
use crate::time::Timestamp;

/// Kind of target a task acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLogKind {
    Scene,
    Device,
}

impl TaskLogKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Device => "device",
        }
    }
}

impl std::str::FromStr for TaskLogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scene" => Ok(Self::Scene),
            "device" => Ok(Self::Device),
            other => Err(format!("unknown task log kind: {other}")),
        }
    }
}

/// Terminal outcome of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskResult {
    Success,
    PartialSuccess,
    Fail,
    Timeout,
    TargetDeleted,
    TargetDisconnected,
}

impl TaskResult {
    /// Map a task body error to the result recorded in its log.
    #[must_use]
    pub fn from_error(err: &SceneHubError) -> Self {
        match err {
            SceneHubError::NotFound(_) => Self::TargetDeleted,
            SceneHubError::DeviceOffline(_) => Self::TargetDisconnected,
            SceneHubError::Timeout(_) => Self::Timeout,
            SceneHubError::Validation(_)
            | SceneHubError::CyclicSceneReference(_)
            | SceneHubError::Storage(_)
            | SceneHubError::Control(_) => Self::Fail,
        }
    }

    /// Anything that is neither a full nor a partial success.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success | Self::PartialSuccess)
    }

    /// Derive a parent's result from its children's results.
    ///
    /// Success if every child succeeded, failure if every child failed,
    /// partial success otherwise. Returns `None` when there are no children.
    #[must_use]
    pub fn aggregate(children: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut total = 0_usize;
        let mut succeeded = 0_usize;
        let mut failed = 0_usize;
        for result in children {
            total += 1;
            match result {
                Self::Success => succeeded += 1,
                Self::PartialSuccess => {}
                _ => failed += 1,
            }
        }
        match total {
            0 => None,
            _ if succeeded == total => Some(Self::Success),
            _ if failed == total => Some(Self::Fail),
            _ => Some(Self::PartialSuccess),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Fail => "fail",
            Self::Timeout => "timeout",
            Self::TargetDeleted => "target_deleted",
            Self::TargetDisconnected => "target_disconnected",
        }
    }
}

impl std::str::FromStr for TaskResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial_success" => Ok(Self::PartialSuccess),
            "fail" => Ok(Self::Fail),
            "timeout" => Ok(Self::Timeout),
            "target_deleted" => Ok(Self::TargetDeleted),
            "target_disconnected" => Ok(Self::TargetDisconnected),
            other => Err(format!("unknown task result: {other}")),
        }
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one executed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLog {
    pub task_id: TaskId,
    pub parent_task_id: Option<TaskId>,
    /// Scene or device name at execution time.
    pub name: String,
    pub kind: TaskLogKind,
    /// Device location, when the target is a device.
    pub location: Option<String>,
    pub finished: bool,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    /// Number of child tasks this task dispatched.
    pub expected_children: u32,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl TaskLog {
    /// A fresh, unfinished log entry.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        parent_task_id: Option<TaskId>,
        name: impl Into<String>,
        kind: TaskLogKind,
        location: Option<String>,
    ) -> Self {
        Self {
            task_id,
            parent_task_id,
            name: name.into(),
            kind,
            location,
            finished: false,
            result: None,
            error: None,
            expected_children: 0,
            created_at: crate::time::now(),
            finished_at: None,
        }
    }

    /// Whether the log holds its final result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finished && self.result.is_some()
    }

    /// Mark the log finished with the outcome of its own body.
    pub fn finish(&mut self, outcome: Result<(), &SceneHubError>, at: Timestamp) {
        match outcome {
            Ok(()) => {
                self.result = Some(TaskResult::Success);
                self.error = None;
            }
            Err(err) => {
                self.result = Some(TaskResult::from_error(err));
                self.error = Some(err.to_string());
            }
        }
        self.finished = true;
        self.finished_at = Some(at);
    }

    /// Derive this log's result from its children.
    ///
    /// Returns `None` until every dispatched child has a log with a terminal
    /// result.
    #[must_use]
    pub fn aggregate_children(&self, children: &[TaskLog]) -> Option<TaskResult> {
        let expected = usize::try_from(self.expected_children).ok()?;
        if children.len() < expected || !children.iter().all(TaskLog::is_terminal) {
            return None;
        }
        TaskResult::aggregate(children.iter().filter_map(|c| c.result))
    }
}
