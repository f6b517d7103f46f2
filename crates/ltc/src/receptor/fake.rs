//! In-memory receptor for tests.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    ActualLrpResponse, CellResponse, DesiredLrpCreateRequest, DesiredLrpResponse,
    DesiredLrpUpdateRequest, ReceptorClient, ReceptorError, ReceptorResult, TaskCreateRequest,
    TaskResponse,
};
use crate::receptor::ApiErrorKind;

#[derive(Debug, Default)]
struct State {
    desired: Vec<DesiredLrpResponse>,
    actual: Vec<ActualLrpResponse>,
    cells: Vec<CellResponse>,
    tasks: Vec<TaskResponse>,
    errors: HashMap<&'static str, ReceptorError>,
    calls: Vec<String>,
    created_lrps: Vec<DesiredLrpCreateRequest>,
    updated_lrps: Vec<(String, DesiredLrpUpdateRequest)>,
    created_tasks: Vec<TaskCreateRequest>,
    upserted_domains: Vec<(String, Duration)>,
    actual_script: Vec<Vec<ActualLrpResponse>>,
}

/// Scriptable receptor that records every call.
#[derive(Debug, Default)]
pub struct FakeReceptor {
    state: Mutex<State>,
}

impl FakeReceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_desired(self, lrps: Vec<DesiredLrpResponse>) -> Self {
        self.state.lock().desired = lrps;
        self
    }

    pub fn with_actual(self, lrps: Vec<ActualLrpResponse>) -> Self {
        self.state.lock().actual = lrps;
        self
    }

    pub fn with_cells(self, cells: Vec<CellResponse>) -> Self {
        self.state.lock().cells = cells;
        self
    }

    pub fn with_tasks(self, tasks: Vec<TaskResponse>) -> Self {
        self.state.lock().tasks = tasks;
        self
    }

    /// Makes the named operation fail with `error`.
    pub fn fail(self, operation: &'static str, error: ReceptorError) -> Self {
        self.state.lock().errors.insert(operation, error);
        self
    }

    /// Successive `actual_lrps_by_process_guid` and `actual_lrps` results.
    /// The last entry repeats once the script is exhausted.
    pub fn with_actual_script(self, script: Vec<Vec<ActualLrpResponse>>) -> Self {
        self.state.lock().actual_script = script;
        self
    }

    pub fn set_actual(&self, lrps: Vec<ActualLrpResponse>) {
        self.state.lock().actual = lrps;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn created_lrps(&self) -> Vec<DesiredLrpCreateRequest> {
        self.state.lock().created_lrps.clone()
    }

    pub fn updated_lrps(&self) -> Vec<(String, DesiredLrpUpdateRequest)> {
        self.state.lock().updated_lrps.clone()
    }

    pub fn created_tasks(&self) -> Vec<TaskCreateRequest> {
        self.state.lock().created_tasks.clone()
    }

    pub fn upserted_domains(&self) -> Vec<(String, Duration)> {
        self.state.lock().upserted_domains.clone()
    }

    fn enter(&self, operation: &'static str, detail: &str) -> ReceptorResult<()> {
        let mut state = self.state.lock();
        if detail.is_empty() {
            state.calls.push(operation.to_string());
        } else {
            state.calls.push(format!("{operation} {detail}"));
        }
        match state.errors.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next_actual(&self) -> Vec<ActualLrpResponse> {
        let mut state = self.state.lock();
        match state.actual_script.len() {
            0 => state.actual.clone(),
            1 => state.actual_script[0].clone(),
            _ => state.actual_script.remove(0),
        }
    }
}

impl ReceptorClient for FakeReceptor {
    async fn desired_lrps(&self) -> ReceptorResult<Vec<DesiredLrpResponse>> {
        self.enter("desired_lrps", "")?;
        Ok(self.state.lock().desired.clone())
    }

    async fn get_desired_lrp(&self, process_guid: &str) -> ReceptorResult<DesiredLrpResponse> {
        self.enter("get_desired_lrp", process_guid)?;
        self.state
            .lock()
            .desired
            .iter()
            .find(|lrp| lrp.process_guid == process_guid)
            .cloned()
            .ok_or_else(|| ReceptorError::api(ApiErrorKind::DesiredLrpNotFound, "Desired LRP with guid not found"))
    }

    async fn create_desired_lrp(&self, request: &DesiredLrpCreateRequest) -> ReceptorResult<()> {
        self.enter("create_desired_lrp", &request.process_guid)?;
        self.state.lock().created_lrps.push(request.clone());
        Ok(())
    }

    async fn update_desired_lrp(
        &self,
        process_guid: &str,
        request: &DesiredLrpUpdateRequest,
    ) -> ReceptorResult<()> {
        self.enter("update_desired_lrp", process_guid)?;
        self.state
            .lock()
            .updated_lrps
            .push((process_guid.to_string(), request.clone()));
        Ok(())
    }

    async fn delete_desired_lrp(&self, process_guid: &str) -> ReceptorResult<()> {
        self.enter("delete_desired_lrp", process_guid)?;
        self.state
            .lock()
            .desired
            .retain(|lrp| lrp.process_guid != process_guid);
        Ok(())
    }

    async fn actual_lrps(&self) -> ReceptorResult<Vec<ActualLrpResponse>> {
        self.enter("actual_lrps", "")?;
        Ok(self.next_actual())
    }

    async fn actual_lrps_by_process_guid(
        &self,
        process_guid: &str,
    ) -> ReceptorResult<Vec<ActualLrpResponse>> {
        self.enter("actual_lrps_by_process_guid", process_guid)?;
        Ok(self
            .next_actual()
            .into_iter()
            .filter(|lrp| lrp.process_guid == process_guid)
            .collect())
    }

    async fn cells(&self) -> ReceptorResult<Vec<CellResponse>> {
        self.enter("cells", "")?;
        Ok(self.state.lock().cells.clone())
    }

    async fn tasks(&self) -> ReceptorResult<Vec<TaskResponse>> {
        self.enter("tasks", "")?;
        Ok(self.state.lock().tasks.clone())
    }

    async fn get_task(&self, task_guid: &str) -> ReceptorResult<TaskResponse> {
        self.enter("get_task", task_guid)?;
        self.state
            .lock()
            .tasks
            .iter()
            .find(|task| task.task_guid == task_guid)
            .cloned()
            .ok_or_else(|| ReceptorError::api(ApiErrorKind::TaskNotFound, "task not found"))
    }

    async fn create_task(&self, request: &TaskCreateRequest) -> ReceptorResult<()> {
        self.enter("create_task", &request.task_guid)?;
        self.state.lock().created_tasks.push(request.clone());
        Ok(())
    }

    async fn cancel_task(&self, task_guid: &str) -> ReceptorResult<()> {
        self.enter("cancel_task", task_guid)
    }

    async fn delete_task(&self, task_guid: &str) -> ReceptorResult<()> {
        self.enter("delete_task", task_guid)
    }

    async fn upsert_domain(&self, domain: &str, ttl: Duration) -> ReceptorResult<()> {
        self.enter("upsert_domain", domain)?;
        self.state
            .lock()
            .upserted_domains
            .push((domain.to_string(), ttl));
        Ok(())
    }
}
