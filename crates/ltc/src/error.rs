//! Error types and process exit statuses.
//!
//! Library operations return [`LtcError`]. Commands report their failure
//! to the user through the terminal UI and then hand an [`ExitStatus`]
//! back to the dispatcher, which terminates through the exit handler.

use thiserror::Error;

use crate::receptor::ReceptorError;

/// App guid reserved by the cluster for the debug log stream of its own
/// components.
pub const LATTICE_DEBUG_LOG_STREAM_APP_ID: &str = "lattice-debug";

/// Message shown when a user tries to claim [`LATTICE_DEBUG_LOG_STREAM_APP_ID`].
pub const ATTEMPTED_TO_CREATE_LATTICE_DEBUG: &str = "lattice-debug is a reserved app name. It is used internally to stream debug logs for lattice components.";

/// Errors produced by the core operations of the CLI.
#[derive(Debug, Error)]
pub enum LtcError {
    /// The control plane returned an error, or could not be reached.
    #[error(transparent)]
    Receptor(#[from] ReceptorError),

    /// No desired or actual LRP exists for the requested app.
    #[error("App not found.")]
    AppNotFound,

    /// No task exists for the requested guid.
    #[error("Task not found.")]
    TaskNotFound,

    /// A mutation targeted an app that has not been created.
    #[error("{0}, is not started. Please start an app first")]
    AppNotStarted(String),

    /// A desired LRP with this guid already exists.
    #[error("{0} is already in use")]
    AppAlreadyExists(String),

    /// A task with this guid has already been submitted.
    #[error("{0} has already been submitted")]
    TaskAlreadySubmitted(String),

    /// The task is not in a state that allows deletion.
    #[error("{0} is not in COMPLETED state")]
    TaskNotCompleted(String),

    /// The reserved debug-log guid was used for a user workload.
    #[error("{}", ATTEMPTED_TO_CREATE_LATTICE_DEBUG)]
    AttemptedToCreateLatticeDebug,

    /// The monitored port is not one of the exposed ports.
    #[error("Monitored port must be in the exposed ports")]
    MonitoredPortNotExposed,

    /// Malformed flags, arguments, image references or documents.
    #[error("{0}")]
    InvalidUserInput(String),

    /// Docker registry lookup failed.
    #[error("{0}")]
    Docker(String),

    /// The log or metrics stream failed.
    #[error("{0}")]
    LogStream(String),

    /// A cluster test step failed.
    #[error("{0}")]
    ClusterTest(String),

    /// The config file could not be read or written.
    #[error("{0}")]
    Persistence(String),

    /// Serialization or deserialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, LtcError>;

/// Failure to submit a user-provided document.
///
/// Carries the guid parsed from the document, if any, so the caller can
/// name it in its diagnostic.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SubmitError {
    /// Guid of the rejected document; empty when the document did not parse.
    pub guid: String,
    /// Why the submission failed.
    pub source: LtcError,
}

impl SubmitError {
    /// Wraps `source` for the document `guid`.
    pub fn new(guid: impl Into<String>, source: impl Into<LtcError>) -> Self {
        Self {
            guid: guid.into(),
            source: source.into(),
        }
    }
}

/// Process exit statuses surfaced by commands.
///
/// A command that fails has already printed its diagnostic, so the
/// display text here is only used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ExitStatus {
    /// Generic failure, e.g. an unknown command.
    #[error("failure")]
    Failure,
    /// The target could not be reached or authorized.
    #[error("bad target")]
    BadTarget,
    /// Instances could not be placed on the cluster.
    #[error("placement error")]
    PlacementError,
    /// A local file could not be read or written.
    #[error("file system error")]
    FileSystemError,
    /// Malformed arguments.
    #[error("invalid syntax")]
    InvalidSyntax,
    /// A remote operation failed.
    #[error("command failed")]
    CommandFailed,
    /// Docker image metadata could not be resolved.
    #[error("bad docker image")]
    BadDocker,
    /// The user interrupted the process.
    #[error("interrupted")]
    SigInt,
}

impl ExitStatus {
    /// Numeric exit code handed to the operating system.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Failure => 1,
            Self::BadTarget => 10,
            Self::PlacementError => 11,
            Self::FileSystemError => 12,
            Self::InvalidSyntax => 13,
            Self::CommandFailed => 14,
            Self::BadDocker => 15,
            Self::SigInt => 130,
        }
    }
}
