//! Read-only task queries.

use std::sync::Arc;

use crate::error::{LtcError, Result};
use crate::receptor::{ApiErrorKind, ReceptorClient, TaskResponse, TaskState};

/// Summary of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInfo {
    /// Task guid.
    pub task_guid: String,
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

impl From<TaskResponse> for TaskInfo {
    fn from(task: TaskResponse) -> Self {
        Self {
            task_guid: task.task_guid,
            cell_id: task.cell_id,
            failed: task.failed,
            failure_reason: task.failure_reason,
            result: task.result,
            state: task.state,
        }
    }
}

/// Reads task state from the receptor.
#[derive(Debug)]
pub struct TaskExaminer<R> {
    receptor: Arc<R>,
}

impl<R: ReceptorClient> TaskExaminer<R> {
    /// Creates an examiner.
    pub const fn new(receptor: Arc<R>) -> Self {
        Self { receptor }
    }

    /// State of one task.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::TaskNotFound`] for unknown guids.
    pub async fn task_status(&self, task_guid: &str) -> Result<TaskInfo> {
        match self.receptor.get_task(task_guid).await {
            Ok(task) => Ok(task.into()),
            Err(e) if e.is(ApiErrorKind::TaskNotFound) => Err(LtcError::TaskNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Every task, by guid.
    ///
    /// # Errors
    ///
    /// Fails if the receptor cannot list tasks.
    pub async fn list_tasks(&self) -> Result<Vec<TaskInfo>> {
        let mut tasks: Vec<TaskInfo> = self
            .receptor
            .tasks()
            .await?
            .into_iter()
            .map(TaskInfo::from)
            .collect();
        tasks.sort_by(|a, b| a.task_guid.cmp(&b.task_guid));
        Ok(tasks)
    }
}
