//! `task`, `submit-task`, `cancel-task` and `delete-task`.

use std::fmt;
use std::sync::Arc;

use crate::commands::app_examiner::colored_task_state;
use crate::error::{ExitStatus, LtcError};
use crate::receptor::ReceptorClient;
use crate::task_examiner::TaskExaminer;
use crate::task_runner::TaskRunner;
use crate::terminal::{Ui, align_columns};

const MISSING_GUID: &str = "Please input a valid TASK_GUID";

/// Task commands.
pub struct TaskCommand<R> {
    examiner: TaskExaminer<R>,
    runner: TaskRunner<R>,
}

impl<R> fmt::Debug for TaskCommand<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCommand").finish_non_exhaustive()
    }
}

impl<R: ReceptorClient> TaskCommand<R> {
    /// Creates the commands.
    pub fn new(receptor: Arc<R>) -> Self {
        Self {
            examiner: TaskExaminer::new(Arc::clone(&receptor)),
            runner: TaskRunner::new(receptor),
        }
    }

    /// `task TASK_GUID`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn task(&self, ui: &mut dyn Ui, guid: Option<&str>) -> Result<(), ExitStatus> {
        let guid = require_guid(ui, guid)?;
        let task = match self.examiner.task_status(guid).await {
            Ok(task) => task,
            Err(LtcError::TaskNotFound) => {
                ui.say_line(&format!("No task '{guid}' was found"));
                return Err(ExitStatus::CommandFailed);
            }
            Err(e) => {
                ui.say_line(&format!("Error fetching task result: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };

        let mut rows = vec![
            vec!["Task Name".to_string(), task.task_guid.clone()],
            vec!["Cell ID".to_string(), task.cell_id.clone()],
            vec!["Status".to_string(), colored_task_state(&task)],
        ];
        if task.failed {
            rows.push(vec!["Failure Reason".to_string(), task.failure_reason.clone()]);
        } else {
            rows.push(vec!["Result".to_string(), task.result.clone()]);
        }
        for line in align_columns(&rows, 4) {
            ui.say_line(&line);
        }
        Ok(())
    }

    /// `submit-task PATH`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn submit_task(&self, ui: &mut dyn Ui, path: Option<&str>) -> Result<(), ExitStatus> {
        let Some(path) = path else {
            ui.say_incorrect_usage("Path to JSON is required");
            return Err(ExitStatus::InvalidSyntax);
        };
        let json = match tokio::fs::read(path).await {
            Ok(json) => json,
            Err(e) => {
                ui.say_line(&format!("Error reading file: {e}"));
                return Err(ExitStatus::FileSystemError);
            }
        };

        match self.runner.submit_task(&json).await {
            Ok(guid) => {
                ui.say_line(&format!("Successfully submitted {guid}"));
                Ok(())
            }
            Err(e) => {
                ui.say_line(&format!("Error submitting {}: {e}", e.guid));
                Err(ExitStatus::CommandFailed)
            }
        }
    }

    /// `cancel-task TASK_GUID`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn cancel_task(&self, ui: &mut dyn Ui, guid: Option<&str>) -> Result<(), ExitStatus> {
        let guid = require_guid(ui, guid)?;
        match self.runner.cancel_task(guid).await {
            Ok(()) => {
                ui.say_line("OK");
                Ok(())
            }
            Err(e) => {
                ui.say_line(&format!("Error cancelling {guid}: {e}"));
                Err(ExitStatus::CommandFailed)
            }
        }
    }

    /// `delete-task TASK_GUID`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn delete_task(&self, ui: &mut dyn Ui, guid: Option<&str>) -> Result<(), ExitStatus> {
        let guid = require_guid(ui, guid)?;
        match self.runner.delete_task(guid).await {
            Ok(()) => {
                ui.say_line("OK");
                Ok(())
            }
            Err(e) => {
                ui.say_line(&format!("Error deleting {guid}: {e}"));
                Err(ExitStatus::CommandFailed)
            }
        }
    }
}

fn require_guid<'a>(ui: &mut dyn Ui, guid: Option<&'a str>) -> Result<&'a str, ExitStatus> {
    match guid {
        Some(guid) if !guid.is_empty() => Ok(guid),
        _ => {
            ui.say_incorrect_usage(MISSING_GUID);
            Err(ExitStatus::InvalidSyntax)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receptor::fake::FakeReceptor;
    use crate::receptor::{TaskResponse, TaskState};
    use crate::terminal::colors;
    use crate::terminal::testing::{buffer_ui, written};

    fn task(guid: &str, state: TaskState) -> TaskResponse {
        TaskResponse {
            task_guid: guid.into(),
            cell_id: "cell-3".into(),
            state,
            ..TaskResponse::default()
        }
    }

    fn command(receptor: FakeReceptor) -> (TaskCommand<FakeReceptor>, Arc<FakeReceptor>) {
        let receptor = Arc::new(receptor);
        (TaskCommand::new(Arc::clone(&receptor)), receptor)
    }

    #[tokio::test]
    async fn shows_completed_task() {
        let (command, _) = command(FakeReceptor::new().with_tasks(vec![TaskResponse {
            result: "42".into(),
            ..task("answer", TaskState::Completed)
        }]));
        let mut ui = buffer_ui("");

        command.task(&mut ui, Some("answer")).await.expect("task");

        let lines: Vec<String> = written(&ui).lines().map(String::from).collect();
        assert_eq!(lines[0], "Task Name    answer");
        assert_eq!(lines[1], "Cell ID      cell-3");
        assert_eq!(lines[2], format!("Status       {}", colors::green("COMPLETED")));
        assert_eq!(lines[3], "Result       42");
    }

    #[tokio::test]
    async fn shows_failure_reason() {
        let (command, _) = command(FakeReceptor::new().with_tasks(vec![TaskResponse {
            failed: true,
            failure_reason: "exit status 2".into(),
            ..task("broken", TaskState::Completed)
        }]));
        let mut ui = buffer_ui("");

        command.task(&mut ui, Some("broken")).await.expect("task");

        let out = written(&ui);
        assert!(out.contains(&colors::red("Failed")));
        assert!(out.contains("Failure Reason    exit status 2"), "{out}");
        assert!(!out.contains("Result"));
    }

    #[tokio::test]
    async fn unknown_task() {
        let (command, _) = command(FakeReceptor::new());
        let mut ui = buffer_ui("");
        let status = command.task(&mut ui, Some("ghost")).await.expect_err("missing");
        assert_eq!(status, ExitStatus::CommandFailed);
        assert_eq!(written(&ui), "No task 'ghost' was found\n");
    }

    #[tokio::test]
    async fn missing_guid_is_incorrect_usage() {
        let (command, receptor) = command(FakeReceptor::new());
        let mut ui = buffer_ui("");
        let status = command.cancel_task(&mut ui, None).await.expect_err("usage");
        assert_eq!(status, ExitStatus::InvalidSyntax);
        assert_eq!(written(&ui), "Incorrect Usage: Please input a valid TASK_GUID\n");
        assert!(receptor.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_and_delete() {
        let (command, receptor) = command(FakeReceptor::new().with_tasks(vec![
            task("running", TaskState::Running),
            task("done", TaskState::Completed),
        ]));
        let mut ui = buffer_ui("");

        command.cancel_task(&mut ui, Some("running")).await.expect("cancel");
        command.cancel_task(&mut ui, Some("done")).await.expect("no-op");
        command.delete_task(&mut ui, Some("done")).await.expect("delete");
        let status = command.delete_task(&mut ui, Some("running")).await.expect_err("running");

        assert_eq!(status, ExitStatus::CommandFailed);
        assert_eq!(
            written(&ui),
            "OK\nOK\nOK\nError deleting running: running is not in COMPLETED state\n"
        );
        let calls = receptor.calls();
        assert!(calls.contains(&"cancel_task running".to_string()));
        assert!(!calls.contains(&"cancel_task done".to_string()));
    }

    #[tokio::test]
    async fn submits_task_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"{"task_guid": "job-1", "domain": "lattice", "rootfs": "docker:///busybox"}"#)
            .expect("write");
        let (command, receptor) = command(FakeReceptor::new());
        let mut ui = buffer_ui("");

        command.submit_task(&mut ui, path.to_str()).await.expect("submit");

        assert_eq!(written(&ui), "Successfully submitted job-1\n");
        assert_eq!(receptor.created_tasks()[0].task_guid, "job-1");
    }

    #[tokio::test]
    async fn duplicate_submission_names_the_guid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"{"task_guid": "job-1"}"#).expect("write");
        let (command, _) = command(FakeReceptor::new().with_tasks(vec![task("job-1", TaskState::Pending)]));
        let mut ui = buffer_ui("");

        let status = command.submit_task(&mut ui, path.to_str()).await.expect_err("duplicate");

        assert_eq!(status, ExitStatus::CommandFailed);
        assert_eq!(written(&ui), "Error submitting job-1: job-1 has already been submitted\n");
    }

    #[tokio::test]
    async fn unreadable_task_file() {
        let (command, _) = command(FakeReceptor::new());
        let mut ui = buffer_ui("");
        let status = command
            .submit_task(&mut ui, Some("/nonexistent/task.json"))
            .await
            .expect_err("unreadable");
        assert_eq!(status, ExitStatus::FileSystemError);
        assert!(written(&ui).starts_with("Error reading file: "));
    }
}
