//! Control-plane (receptor) adapter.
//!
//! [`ReceptorClient`] is the seam between the CLI core and the cluster's
//! HTTP API. [`HttpReceptorClient`] talks to a real receptor; tests use an
//! in-memory fake.

#[cfg(test)]
pub(crate) mod fake;
mod http;
mod resources;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpReceptorClient;
pub use resources::{
    Action, ActualLrpResponse, ActualLrpState, CellCapacity, CellResponse, DesiredLrpCreateRequest,
    DesiredLrpResponse, DesiredLrpUpdateRequest, DownloadAction, EnvironmentVariable, PortMapping,
    ResourceLimits, RoutingInfo, RunAction, TaskCreateRequest, TaskResponse, TaskState,
    UploadAction,
};

/// Error names the receptor reports in `{name, message}` bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiErrorKind {
    /// A task with the guid exists.
    TaskGuidAlreadyExists,
    /// The task cannot be deleted in its current state.
    TaskNotDeletable,
    /// No such task.
    TaskNotFound,
    /// Malformed task.
    InvalidTask,
    /// A desired LRP with the guid exists.
    #[serde(rename = "DesiredLRPAlreadyExists")]
    DesiredLrpAlreadyExists,
    /// No such desired LRP.
    #[serde(rename = "DesiredLRPNotFound")]
    DesiredLrpNotFound,
    /// Malformed desired LRP.
    #[serde(rename = "InvalidLRP")]
    InvalidLrp,
    /// Malformed domain.
    InvalidDomain,
    /// Undecodable JSON.
    #[serde(rename = "InvalidJSON")]
    InvalidJson,
    /// Malformed request.
    InvalidRequest,
    /// Unexpected response.
    InvalidResponse,
    /// Unclassified server-side failure.
    UnknownError,
    /// Missing or wrong credentials.
    Unauthorized,
    /// No actual LRP at the index.
    #[serde(rename = "ActualLRPIndexNotFound")]
    ActualLrpIndexNotFound,
    /// Concurrent modification.
    ResourceConflict,
    /// The HTTP router in front of the receptor rejected the request.
    RouterError,
    /// A name not listed above.
    #[serde(other)]
    Unknown,
}

/// Failure of a receptor call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceptorError {
    /// The receptor answered with an error document.
    #[error("{message}")]
    Api {
        /// Error name.
        kind: ApiErrorKind,
        /// Error detail.
        message: String,
    },

    /// The receptor could not be reached.
    #[error("{0}")]
    Transport(String),
}

impl ReceptorError {
    /// Builds an API error.
    #[must_use]
    pub fn api(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            message: message.into(),
        }
    }

    /// The API error name, if the receptor answered.
    #[must_use]
    pub const fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            Self::Transport(_) => None,
        }
    }

    /// Whether this is an API error named `kind`.
    #[must_use]
    pub fn is(&self, kind: ApiErrorKind) -> bool {
        self.kind() == Some(kind)
    }
}

/// Result of a receptor call.
pub type ReceptorResult<T> = std::result::Result<T, ReceptorError>;

/// Typed operations over the receptor HTTP API.
pub trait ReceptorClient: Send + Sync {
    /// `GET /v1/desired_lrps`.
    fn desired_lrps(&self) -> impl Future<Output = ReceptorResult<Vec<DesiredLrpResponse>>> + Send;

    /// `GET /v1/desired_lrps/:guid`.
    fn get_desired_lrp(
        &self,
        process_guid: &str,
    ) -> impl Future<Output = ReceptorResult<DesiredLrpResponse>> + Send;

    /// `POST /v1/desired_lrps`.
    fn create_desired_lrp(
        &self,
        request: &DesiredLrpCreateRequest,
    ) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `PUT /v1/desired_lrps/:guid`.
    fn update_desired_lrp(
        &self,
        process_guid: &str,
        request: &DesiredLrpUpdateRequest,
    ) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `DELETE /v1/desired_lrps/:guid`.
    fn delete_desired_lrp(&self, process_guid: &str) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `GET /v1/actual_lrps`.
    fn actual_lrps(&self) -> impl Future<Output = ReceptorResult<Vec<ActualLrpResponse>>> + Send;

    /// `GET /v1/actual_lrps/:guid`.
    fn actual_lrps_by_process_guid(
        &self,
        process_guid: &str,
    ) -> impl Future<Output = ReceptorResult<Vec<ActualLrpResponse>>> + Send;

    /// `GET /v1/cells`.
    fn cells(&self) -> impl Future<Output = ReceptorResult<Vec<CellResponse>>> + Send;

    /// `GET /v1/tasks`.
    fn tasks(&self) -> impl Future<Output = ReceptorResult<Vec<TaskResponse>>> + Send;

    /// `GET /v1/tasks/:guid`.
    fn get_task(&self, task_guid: &str) -> impl Future<Output = ReceptorResult<TaskResponse>> + Send;

    /// `POST /v1/tasks`.
    fn create_task(&self, request: &TaskCreateRequest) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `POST /v1/tasks/:guid/cancel`.
    fn cancel_task(&self, task_guid: &str) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `DELETE /v1/tasks/:guid`.
    fn delete_task(&self, task_guid: &str) -> impl Future<Output = ReceptorResult<()>> + Send;

    /// `PUT /v1/domains/:domain`. A zero `ttl` keeps the domain fresh
    /// indefinitely.
    fn upsert_domain(&self, domain: &str, ttl: Duration) -> impl Future<Output = ReceptorResult<()>> + Send;
}
