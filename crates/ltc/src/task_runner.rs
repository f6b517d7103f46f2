//! Submits, cancels and deletes one-shot tasks.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::app_runner::LRP_DOMAIN;
use crate::error::{LATTICE_DEBUG_LOG_STREAM_APP_ID, LtcError, Result, SubmitError};
use crate::receptor::{ApiErrorKind, ReceptorClient, TaskCreateRequest, TaskState};

/// Mutating task operations.
#[derive(Debug)]
pub struct TaskRunner<R> {
    receptor: Arc<R>,
}

impl<R: ReceptorClient> TaskRunner<R> {
    /// Creates a runner.
    pub const fn new(receptor: Arc<R>) -> Self {
        Self { receptor }
    }

    /// Submits a task document and returns its guid.
    ///
    /// # Errors
    ///
    /// Fails for unparseable documents, the reserved debug guid, a guid
    /// already in use and receptor errors. The error carries the guid
    /// whenever the document parsed.
    pub async fn submit_task(&self, task_json: &[u8]) -> std::result::Result<String, SubmitError> {
        let request: TaskCreateRequest =
            serde_json::from_slice(task_json).map_err(|e| SubmitError::new("", e))?;
        let guid = request.task_guid.clone();

        if guid == LATTICE_DEBUG_LOG_STREAM_APP_ID {
            return Err(SubmitError::new(guid, LtcError::AttemptedToCreateLatticeDebug));
        }
        match self.receptor.get_task(&guid).await {
            Ok(_) => return Err(SubmitError::new(guid.clone(), LtcError::TaskAlreadySubmitted(guid))),
            Err(e) if e.is(ApiErrorKind::TaskNotFound) => {}
            Err(e) => return Err(SubmitError::new(guid, e)),
        }
        if let Err(e) = self.receptor.upsert_domain(LRP_DOMAIN, Duration::ZERO).await {
            return Err(SubmitError::new(guid, e));
        }

        info!(task = %guid, "creating task");
        if let Err(e) = self.receptor.create_task(&request).await {
            return Err(SubmitError::new(guid, e));
        }
        Ok(guid)
    }

    /// Deletes a completed task.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::TaskNotCompleted`] unless the task is
    /// `COMPLETED`.
    pub async fn delete_task(&self, task_guid: &str) -> Result<()> {
        let task = self.receptor.get_task(task_guid).await?;
        if task.state != TaskState::Completed {
            return Err(LtcError::TaskNotCompleted(task_guid.to_string()));
        }
        self.receptor.delete_task(task_guid).await?;
        Ok(())
    }

    /// Cancels a task. Tasks that already finished are left alone.
    ///
    /// # Errors
    ///
    /// Fails if the task does not exist or the receptor rejects the cancel.
    pub async fn cancel_task(&self, task_guid: &str) -> Result<()> {
        let task = self.receptor.get_task(task_guid).await?;
        if task.state.is_terminal() {
            return Ok(());
        }
        self.receptor.cancel_task(task_guid).await?;
        Ok(())
    }
}
