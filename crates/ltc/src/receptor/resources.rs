//! Receptor API request and response documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Routing information keyed by router name. Each value is an opaque
/// JSON document owned by that router.
pub type RoutingInfo = BTreeMap<String, serde_json::Value>;

/// Environment variable passed to a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvironmentVariable {
    /// Creates a variable.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Process limits applied to a run action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of open files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
}

/// Runs a process in the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAction {
    /// Executable path.
    pub path: String,
    /// Arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,
    /// Extra environment for this process only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvironmentVariable>,
    /// Process limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<ResourceLimits>,
    /// Container user to run as.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    /// Log source tag for the process output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_source: String,
}

/// Downloads and extracts an archive into the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadAction {
    /// Human-readable artifact name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact: String,
    /// Source URL.
    pub from: String,
    /// Destination directory.
    pub to: String,
    /// Download cache key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cache_key: String,
    /// Log source tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_source: String,
    /// Container user owning the files.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// Uploads a file out of the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAction {
    /// Human-readable artifact name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact: String,
    /// Path inside the container.
    pub from: String,
    /// Destination URL.
    pub to: String,
    /// Log source tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_source: String,
    /// Container user reading the file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// A unit of work executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Run a process.
    Run(RunAction),
    /// Download an archive.
    Download(DownloadAction),
    /// Upload a file.
    Upload(UploadAction),
    /// Run `action`, failing it after `timeout` nanoseconds.
    Timeout {
        /// Wrapped action.
        action: Box<Action>,
        /// Timeout in nanoseconds.
        timeout: i64,
    },
    /// Run `action`, ignoring its failure.
    Try {
        /// Wrapped action.
        action: Box<Action>,
    },
    /// Run all actions concurrently.
    Parallel {
        /// Actions to run.
        actions: Vec<Action>,
    },
    /// Run actions one after another.
    Serial {
        /// Actions to run.
        actions: Vec<Action>,
    },
    /// Run `action`, emitting progress messages around it.
    EmitProgress {
        /// Wrapped action.
        action: Box<Action>,
        /// Printed before the action starts.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        start_message: String,
        /// Printed when the action succeeds.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        success_message: String,
        /// Prefix of the message printed on failure.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        failure_message_prefix: String,
    },
}

/// Request body for `POST /v1/desired_lrps`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrpCreateRequest {
    /// Workload guid.
    pub process_guid: String,
    /// Freshness domain.
    pub domain: String,
    /// Root filesystem, e.g. `docker:///library/redis#latest`.
    pub rootfs: String,
    /// Desired instance count.
    pub instances: i32,
    /// Container environment.
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    /// Runs once before `action`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<Action>,
    /// Main process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Health check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<Action>,
    /// Seconds the monitor may fail before the instance is crashed.
    #[serde(default)]
    pub start_timeout: u32,
    /// Disk limit.
    #[serde(default)]
    pub disk_mb: i32,
    /// Memory limit.
    #[serde(default)]
    pub memory_mb: i32,
    /// Relative CPU share.
    #[serde(default)]
    pub cpu_weight: u32,
    /// Run with escalated privileges.
    #[serde(default)]
    pub privileged: bool,
    /// Exposed container ports.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Router configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<RoutingInfo>,
    /// Log stream guid.
    #[serde(default)]
    pub log_guid: String,
    /// Log source tag.
    #[serde(default)]
    pub log_source: String,
    /// Metrics stream guid.
    #[serde(default)]
    pub metrics_guid: String,
    /// Free-form annotation.
    #[serde(default)]
    pub annotation: String,
}

/// Request body for `PUT /v1/desired_lrps/:guid`. Absent fields are
/// left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrpUpdateRequest {
    /// New instance count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<i32>,
    /// New router configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<RoutingInfo>,
    /// New annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// A desired LRP as reported by the receptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesiredLrpResponse {
    /// Workload guid.
    pub process_guid: String,
    /// Freshness domain.
    pub domain: String,
    /// Root filesystem.
    pub rootfs: String,
    /// Desired instance count.
    pub instances: i32,
    /// Container environment.
    pub env: Vec<EnvironmentVariable>,
    /// Seconds the monitor may fail before the instance is crashed.
    pub start_timeout: u32,
    /// Disk limit.
    pub disk_mb: i32,
    /// Memory limit.
    pub memory_mb: i32,
    /// Relative CPU share.
    pub cpu_weight: u32,
    /// Escalated privileges.
    pub privileged: bool,
    /// Exposed container ports.
    pub ports: Vec<u16>,
    /// Router configuration.
    pub routes: Option<RoutingInfo>,
    /// Log stream guid.
    pub log_guid: String,
    /// Log source tag.
    pub log_source: String,
    /// Free-form annotation.
    pub annotation: String,
}

/// State of one actual LRP instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActualLrpState {
    /// Waiting for placement.
    Unclaimed,
    /// Placed on a cell, starting.
    Claimed,
    /// Running.
    Running,
    /// Crashed, possibly awaiting restart.
    Crashed,
    /// Unrecognized state.
    #[default]
    #[serde(other)]
    Invalid,
}

impl ActualLrpState {
    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unclaimed => "UNCLAIMED",
            Self::Claimed => "CLAIMED",
            Self::Running => "RUNNING",
            Self::Crashed => "CRASHED",
            Self::Invalid => "INVALID",
        }
    }
}

impl std::fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host to container port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Port on the cell.
    pub host_port: u16,
}

/// An actual LRP instance as reported by the receptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActualLrpResponse {
    /// Workload guid.
    pub process_guid: String,
    /// Instance guid.
    pub instance_guid: String,
    /// Cell hosting the instance.
    pub cell_id: String,
    /// Freshness domain.
    pub domain: String,
    /// Instance index.
    pub index: i32,
    /// Cell address.
    pub address: String,
    /// Port mappings.
    pub ports: Vec<PortMapping>,
    /// Lifecycle state.
    pub state: ActualLrpState,
    /// Number of crashes so far.
    pub crash_count: i32,
    /// Reason of the last crash.
    pub crash_reason: String,
    /// Why the instance could not be placed.
    pub placement_error: String,
    /// Unix nanoseconds of the last state change.
    pub since: i64,
    /// Whether the instance is being evacuated.
    pub evacuating: bool,
}

/// Resources of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellCapacity {
    /// Memory in MB.
    pub memory_mb: i32,
    /// Disk in MB.
    pub disk_mb: i32,
    /// Maximum number of containers.
    pub containers: i32,
}

/// A cell as reported by the receptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellResponse {
    /// Cell id, e.g. `cell-0`.
    pub cell_id: String,
    /// Availability zone.
    pub zone: String,
    /// Resources.
    pub capacity: CellCapacity,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    /// Waiting for placement.
    Pending,
    /// Placed on a cell.
    Claimed,
    /// Running.
    Running,
    /// Finished, result available.
    Completed,
    /// Completion callback in progress.
    Resolving,
    /// Unrecognized state.
    #[default]
    #[serde(other)]
    Invalid,
}

impl TaskState {
    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Claimed => "CLAIMED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Resolving => "RESOLVING",
            Self::Invalid => "INVALID",
        }
    }

    /// Whether the task has finished running.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Resolving)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for `POST /v1/tasks`.
///
/// Only the guid and domain are interpreted here. Every other field of a
/// user-submitted document is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCreateRequest {
    /// Task guid.
    pub task_guid: String,
    /// Freshness domain.
    #[serde(default)]
    pub domain: String,
    /// Remaining fields of the document.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// A task as reported by the receptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResponse {
    /// Task guid.
    pub task_guid: String,
    /// Freshness domain.
    pub domain: String,
    /// Root filesystem.
    pub rootfs: String,
    /// Cell running the task.
    pub cell_id: String,
    /// Whether the task failed.
    pub failed: bool,
    /// Why the task failed.
    pub failure_reason: String,
    /// Contents of the result file.
    pub result: String,
    /// Lifecycle state.
    pub state: TaskState,
}
