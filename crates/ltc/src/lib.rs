//! # ltc
//!
//! Command-line client for a lattice cluster.
//!
//! `ltc` creates, scales and removes long-running docker apps, submits and
//! inspects one-off tasks, tails application and component logs, and shows
//! live status and distribution views. Every cluster operation goes through
//! the receptor's HTTP API; logs and container metrics arrive over the
//! loggregator (doppler) websocket.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   HTTP/JSON    ┌────────────┐
//! │           │◄──────────────►│  receptor  │
//! │    ltc    │                └────────────┘
//! │           │   websocket    ┌────────────┐
//! │           │◄───────────────│  doppler   │
//! └───────────┘                └────────────┘
//! ```
//!
//! [`dispatcher::Dispatcher`] verifies the target and routes each parsed
//! [`cli::Commands`] to a command in [`commands`], which reports on a
//! [`terminal::Ui`] and returns an [`error::ExitStatus`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app_examiner;
pub mod app_runner;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod docker;
pub mod error;
pub mod exit_handler;
pub mod graphical;
pub mod logs;
pub mod receptor;
pub mod refresh;
pub mod route_helpers;
pub mod target_verifier;
pub mod task_examiner;
pub mod task_runner;
pub mod terminal;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{ExitStatus, LtcError, Result};
pub use exit_handler::ExitHandler;
