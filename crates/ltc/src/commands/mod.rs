//! Command implementations.
//!
//! Each command reports its own diagnostics on the [`Ui`](crate::terminal::Ui)
//! and returns the [`ExitStatus`](crate::error::ExitStatus) the process
//! should end with.

pub mod app_examiner;
pub mod app_runner;
pub mod config;
pub mod logs;
pub mod task;

pub use app_examiner::AppExaminerCommand;
pub use app_runner::AppRunnerCommand;
pub use cluster_test::run_cluster_test;
pub use config::ConfigCommand;
pub use logs::LogsCommand;
pub use task::TaskCommand;
