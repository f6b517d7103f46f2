//! Routes a parsed command line to its command.
//!
//! Everything except `target`, `target-blob` and bare `ltc` talks to the
//! cluster, so the target is verified once up front and the clients are
//! built from the persisted config.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::CommandFactory;
use tracing::{debug, warn};

use crate::cli::{Cli, Commands};
use crate::cluster_test::{ClusterTestRunner, HttpRouteChecker, SubprocessInvoker};
use crate::commands::config::UNREACHABLE_TARGET;
use crate::commands::{
    AppExaminerCommand, AppRunnerCommand, ConfigCommand, LogsCommand, TaskCommand,
    run_cluster_test,
};
use crate::config::Config;
use crate::docker::HttpRegistrySessionFactory;
use crate::error::ExitStatus;
use crate::exit_handler::ExitHandler;
use crate::logs::NoaaConsumer;
use crate::receptor::HttpReceptorClient;
use crate::refresh::TokioClock;
use crate::target_verifier::{TargetVerifier, Verification};
use crate::terminal::Ui;

/// Environment variable overriding the poll timeout, in whole seconds.
pub const LATTICE_CLI_TIMEOUT_ENV: &str = "LATTICE_CLI_TIMEOUT";

/// How long `create` and `scale` wait for instances by default.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Printed when the receptor rejects the stored credentials.
pub const UNAUTHORIZED_TARGET: &str =
    "Could not authenticate with the receptor. Please run ltc target with the correct credentials.";

const ROUTE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Parses a [`LATTICE_CLI_TIMEOUT_ENV`] value. Missing, malformed and
/// non-positive values give [`DEFAULT_POLL_TIMEOUT`].
#[must_use]
pub fn poll_timeout(value: Option<&str>) -> Duration {
    match value.map(|v| v.trim().parse::<u64>()) {
        None => DEFAULT_POLL_TIMEOUT,
        Some(Ok(seconds)) if seconds > 0 => Duration::from_secs(seconds),
        Some(_) => {
            warn!(value, "ignoring invalid {LATTICE_CLI_TIMEOUT_ENV}");
            DEFAULT_POLL_TIMEOUT
        }
    }
}

/// Runs one command against the persisted config.
pub struct Dispatcher<V> {
    config: Config,
    verifier: V,
    exit_handler: ExitHandler,
    timeout: Duration,
}

impl<V> fmt::Debug for Dispatcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target", &self.config.target())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<V: TargetVerifier> Dispatcher<V> {
    /// Creates a dispatcher over a loaded `config`.
    pub const fn new(config: Config, verifier: V, exit_handler: ExitHandler, timeout: Duration) -> Self {
        Self {
            config,
            verifier,
            exit_handler,
            timeout,
        }
    }

    /// Runs `command`, returning the exit status on failure.
    ///
    /// # Errors
    ///
    /// Returns the exit status of a failed command. Diagnostics have
    /// already been written to `ui`.
    pub async fn dispatch(&mut self, ui: &mut dyn Ui, command: Option<Commands>) -> Result<(), ExitStatus> {
        let command = match command {
            None => {
                ui.say(&Cli::command().render_help().to_string());
                return Ok(());
            }
            Some(Commands::External(args)) => {
                let name = args.first().map_or("", String::as_str);
                ui.say_line(&format!("ltc: '{name}' is not a registered command"));
                return Err(ExitStatus::Failure);
            }
            Some(Commands::Target { target }) => {
                return ConfigCommand::new(&mut self.config, &self.verifier)
                    .target(ui, target.as_deref())
                    .await;
            }
            Some(Commands::TargetBlob { target }) => {
                return ConfigCommand::new(&mut self.config, &self.verifier)
                    .target_blob(ui, target.as_deref());
            }
            Some(command) => command,
        };

        self.verify(ui).await?;
        self.run(ui, command).await
    }

    async fn verify(&self, ui: &mut dyn Ui) -> Result<(), ExitStatus> {
        match self.verifier.verify_target(&self.config.receptor()).await {
            Verification {
                reachable: true,
                authorized: true,
                ..
            } => Ok(()),
            Verification {
                reachable: true,
                authorized: false,
                error: None,
            } => {
                ui.say_line(UNAUTHORIZED_TARGET);
                Err(ExitStatus::BadTarget)
            }
            Verification { error, .. } => {
                let cause = error.map(|e| e.to_string()).unwrap_or_default();
                ui.say_line(&format!("{UNREACHABLE_TARGET}  Underlying error: {cause}"));
                Err(ExitStatus::BadTarget)
            }
        }
    }

    async fn run(&self, ui: &mut dyn Ui, command: Commands) -> Result<(), ExitStatus> {
        let receptor = match HttpReceptorClient::new(&self.config.receptor()) {
            Ok(receptor) => Arc::new(receptor),
            Err(e) => {
                ui.say_line(&format!("{UNREACHABLE_TARGET}  Underlying error: {e}"));
                return Err(ExitStatus::BadTarget);
            }
        };
        let domain = self.config.target();
        let noaa = || NoaaConsumer::new(self.config.loggregator_url());
        debug!(domain, ?command, "dispatching");

        let app_runner = || {
            AppRunnerCommand::new(
                Arc::clone(&receptor),
                domain,
                noaa(),
                HttpRegistrySessionFactory::new(),
                Arc::new(noaa()),
                TokioClock,
                self.exit_handler.clone(),
                self.timeout,
            )
        };
        let app_examiner = || {
            AppExaminerCommand::new(Arc::clone(&receptor), noaa(), TokioClock, self.exit_handler.clone())
        };
        let logs = || {
            LogsCommand::new(
                Arc::clone(&receptor),
                noaa(),
                Arc::new(noaa()),
                self.exit_handler.clone(),
            )
        };
        let tasks = || TaskCommand::new(Arc::clone(&receptor));

        match command {
            Commands::Create(args) => app_runner().create(ui, &args).await,
            Commands::SubmitLrp { path } => app_runner().submit_lrp(ui, path.as_deref()).await,
            Commands::Scale { name, instances } => {
                app_runner()
                    .scale(ui, name.as_deref(), instances.as_deref())
                    .await
            }
            Commands::UpdateRoutes { name, routes } => {
                app_runner()
                    .update_routes(ui, name.as_deref(), routes.as_deref())
                    .await
            }
            Commands::Remove { names } => app_runner().remove(ui, &names).await,
            Commands::List => app_examiner().list(ui).await,
            Commands::Status {
                name,
                rate,
                summary,
            } => app_examiner().status(ui, name.as_deref(), rate, summary).await,
            Commands::Visualize { rate, graphical } => {
                app_examiner().visualize(ui, rate, graphical).await
            }
            Commands::Cells => app_examiner().cells(ui).await,
            Commands::Logs { name } => logs().logs(ui, name.as_deref()).await,
            Commands::DebugLogs { raw } => logs().debug_logs(ui, raw).await,
            Commands::SubmitTask { path } => tasks().submit_task(ui, path.as_deref()).await,
            Commands::Task { guid } => tasks().task(ui, guid.as_deref()).await,
            Commands::CancelTask { guid } => tasks().cancel_task(ui, guid.as_deref()).await,
            Commands::DeleteTask { guid } => tasks().delete_task(ui, guid.as_deref()).await,
            Commands::Test { timeout, verbose } => self.cluster_test(ui, timeout, verbose).await,
            Commands::Target { .. } | Commands::TargetBlob { .. } | Commands::External(_) => Ok(()),
        }
    }

    async fn cluster_test(&self, ui: &mut dyn Ui, timeout: Duration, verbose: bool) -> Result<(), ExitStatus> {
        let invoker = SubprocessInvoker::current();
        let checker = HttpRouteChecker::new(ROUTE_CHECK_TIMEOUT);
        let (invoker, checker) = match (invoker, checker) {
            (Ok(invoker), Ok(checker)) => (invoker, checker),
            (Err(e), _) | (_, Err(e)) => {
                ui.say_line(&format!("Error starting cluster test: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };
        let runner = ClusterTestRunner::new(invoker, checker, self.config.target());
        run_cluster_test(ui, &runner, timeout, verbose).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Data, MemPersister};
    use crate::receptor::{ApiErrorKind, ReceptorError};
    use crate::target_verifier::fake::FakeTargetVerifier;
    use crate::terminal::testing::{buffer_ui, written};
    use test_case::test_case;

    fn dispatcher(verification: Verification) -> Dispatcher<FakeTargetVerifier> {
        let persister = MemPersister::with_data(Data {
            target: "lattice.dev".into(),
            ..Data::default()
        });
        let mut config = Config::new(persister);
        config.load().expect("load");
        Dispatcher::new(
            config,
            FakeTargetVerifier::new(vec![verification]),
            ExitHandler::with_exiter(|_| {}),
            DEFAULT_POLL_TIMEOUT,
        )
    }

    #[test_case(None, 60 ; "unset")]
    #[test_case(Some("15"), 15 ; "seconds")]
    #[test_case(Some("0"), 60 ; "zero")]
    #[test_case(Some("-4"), 60 ; "negative")]
    #[test_case(Some("soon"), 60 ; "garbage")]
    fn timeout_from_environment(value: Option<&str>, seconds: u64) {
        assert_eq!(poll_timeout(value), Duration::from_secs(seconds));
    }

    #[tokio::test]
    async fn unknown_command() {
        let mut dispatcher = dispatcher(Verification::ok());
        let mut ui = buffer_ui("");

        let status = dispatcher
            .dispatch(&mut ui, Some(Commands::External(vec!["foo".into()])))
            .await
            .expect_err("unknown");

        assert_eq!(status.code(), 1);
        assert_eq!(written(&ui), "ltc: 'foo' is not a registered command\n");
        assert!(dispatcher.verifier.urls().is_empty());
    }

    #[tokio::test]
    async fn target_skips_verification() {
        let mut dispatcher = dispatcher(Verification {
            reachable: false,
            authorized: false,
            error: Some(ReceptorError::Transport("down".into())),
        });
        let mut ui = buffer_ui("");

        dispatcher
            .dispatch(&mut ui, Some(Commands::Target { target: None }))
            .await
            .expect("target");

        assert_eq!(written(&ui), "Target:\t\tlattice.dev\n");
        assert!(dispatcher.verifier.urls().is_empty());
    }

    #[tokio::test]
    async fn no_command_prints_help() {
        let mut dispatcher = dispatcher(Verification::ok());
        let mut ui = buffer_ui("");

        dispatcher.dispatch(&mut ui, None).await.expect("help");

        assert!(written(&ui).contains("Usage: ltc"));
        assert!(dispatcher.verifier.urls().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_target_stops_command() {
        let mut dispatcher = dispatcher(Verification {
            reachable: true,
            authorized: false,
            error: None,
        });
        let mut ui = buffer_ui("");

        let status = dispatcher
            .dispatch(&mut ui, Some(Commands::List))
            .await
            .expect_err("unauthorized");

        assert_eq!(status, ExitStatus::BadTarget);
        assert_eq!(written(&ui), format!("{UNAUTHORIZED_TARGET}\n"));
        assert_eq!(dispatcher.verifier.urls(), vec!["http://receptor.lattice.dev"]);
    }

    #[tokio::test]
    async fn unreachable_target_stops_command() {
        let mut dispatcher = dispatcher(Verification {
            reachable: true,
            authorized: false,
            error: Some(ReceptorError::api(ApiErrorKind::UnknownError, "teapot")),
        });
        let mut ui = buffer_ui("");

        let status = dispatcher
            .dispatch(&mut ui, Some(Commands::Cells))
            .await
            .expect_err("unreachable");

        assert_eq!(status, ExitStatus::BadTarget);
        let out = written(&ui);
        assert!(out.starts_with(UNREACHABLE_TARGET), "{out}");
        assert!(out.ends_with("Underlying error: teapot\n"), "{out}");
    }
}
