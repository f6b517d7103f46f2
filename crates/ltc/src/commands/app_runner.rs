//! `create`, `submit-lrp`, `scale`, `update-routes` and `remove`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::app_examiner::{AppExaminer, MetricsSource};
use crate::app_runner::{AppRunner, CreateAppParams};
use crate::cli::CreateArgs;
use crate::docker::{DockerMetadataFetcher, PortConfig, RegistrySessionFactory, format_for_receptor};
use crate::error::ExitStatus;
use crate::exit_handler::ExitHandler;
use crate::logs::{LogConsumer, TailedLogsOutputter};
use crate::receptor::{EnvironmentVariable, ReceptorClient};
use crate::refresh::Clock;
use crate::route_helpers::parse_route_overrides;
use crate::terminal::{SharedUi, Ui, colors};

/// Printed when instances could not be placed on any cell.
pub const PLACEMENT_ERROR: &str = "Error, could not place all instances: insufficient resources. Try requesting fewer instances or reducing the requested memory or disk capacity.";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_WORKING_DIR: &str = "/";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

enum Check {
    Pending,
    Done,
    PlacementError,
}

enum PollOutcome {
    Done,
    PlacementError,
    TimedOut,
    Interrupted,
}

/// Commands that change apps, polling until the cluster catches up.
pub struct AppRunnerCommand<R, F, M, L, C> {
    runner: AppRunner<R>,
    examiner: AppExaminer<R, M>,
    docker: DockerMetadataFetcher<F>,
    logs: Arc<L>,
    clock: C,
    exit_handler: ExitHandler,
    timeout: Duration,
    env_lookup: EnvLookup,
}

impl<R, F, M, L, C> fmt::Debug for AppRunnerCommand<R, F, M, L, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRunnerCommand")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<R, F, M, L, C> AppRunnerCommand<R, F, M, L, C>
where
    R: ReceptorClient,
    F: RegistrySessionFactory,
    M: MetricsSource,
    L: LogConsumer,
    C: Clock,
{
    /// Creates the commands. Apps are routed below `domain`, app logs are
    /// tailed from `logs` while `create` waits, and polling gives up after
    /// `timeout`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receptor: Arc<R>,
        domain: &str,
        metrics: M,
        session_factory: F,
        logs: Arc<L>,
        clock: C,
        exit_handler: ExitHandler,
        timeout: Duration,
    ) -> Self {
        Self {
            runner: AppRunner::new(Arc::clone(&receptor), domain),
            examiner: AppExaminer::new(receptor, metrics),
            docker: DockerMetadataFetcher::new(session_factory),
            logs,
            clock,
            exit_handler,
            timeout,
            env_lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replaces how bare `-e NAME` flags are resolved.
    #[must_use]
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env_lookup = Box::new(lookup);
        self
    }

    /// `create APP_NAME DOCKER_IMAGE [-- START_COMMAND ARGS...]`.
    ///
    /// Fills the start command, working directory and ports from image
    /// metadata when they are not given and layers `-e` variables over the
    /// image's own environment. Then waits for the first instance while
    /// tailing the app's logs.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn create(&self, ui: &mut dyn Ui, args: &CreateArgs) -> Result<(), ExitStatus> {
        let (name, image) = match args.args.as_slice() {
            [name, image] => (name.as_str(), image.as_str()),
            [] | [_] => return Err(incorrect_usage(ui, "APP_NAME and DOCKER_IMAGE are required")),
            _ => return Err(incorrect_usage(ui, "'--' Required before start command")),
        };
        if !(1..=100).contains(&args.cpu_weight) {
            return Err(incorrect_usage(ui, "Invalid CPU Weight"));
        }
        let route_overrides = match args.routes.as_deref() {
            Some(routes) => {
                parse_route_overrides(routes).map_err(|e| incorrect_usage(ui, &e.to_string()))?
            }
            None => Vec::new(),
        };
        let rootfs = format_for_receptor(image).map_err(|e| incorrect_usage(ui, &e.to_string()))?;

        let needs_metadata =
            args.start_command.is_empty() || args.working_dir.is_none() || args.ports.is_empty();
        let metadata = if needs_metadata {
            match self.docker.fetch_metadata(image).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    ui.say_line(&format!("Error fetching image metadata: {e}"));
                    return Err(ExitStatus::BadDocker);
                }
            }
        } else {
            None
        };

        let start_command = if args.start_command.is_empty() {
            metadata
                .as_ref()
                .map(|m| m.start_command.as_slice())
                .unwrap_or_default()
        } else {
            args.start_command.as_slice()
        };
        let Some((start_command, app_args)) = start_command.split_first() else {
            ui.say_line("Unable to determine start command from image metadata.");
            return Err(ExitStatus::BadDocker);
        };
        let working_dir = args
            .working_dir
            .clone()
            .or_else(|| {
                metadata
                    .as_ref()
                    .map(|m| m.working_dir.clone())
                    .filter(|dir| !dir.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_WORKING_DIR.to_string());
        let image_env = metadata.as_ref().map(|m| m.env.as_slice()).unwrap_or_default();
        let env = merge_env(image_env, parse_env(&args.env, &self.env_lookup));

        let mut ports = if args.ports.is_empty() {
            metadata.as_ref().map(|m| m.ports.clone()).unwrap_or_default()
        } else {
            PortConfig::from_exposed(args.ports.iter().copied())
        };
        if let Some(monitored) = args.monitored_port {
            ports.monitored = monitored;
        }

        let params = CreateAppParams {
            name: name.to_string(),
            rootfs,
            start_command: start_command.clone(),
            app_args: app_args.to_vec(),
            working_dir,
            env,
            privileged: args.run_as_root,
            instances: args.instances,
            cpu_weight: args.cpu_weight,
            memory_mb: args.memory_mb,
            disk_mb: args.disk_mb,
            monitor: !args.no_monitor
                && (args.monitored_port.is_some() || !ports.exposed.is_empty()),
            ports,
            route_overrides,
            no_routes: args.no_routes,
            annotation: String::new(),
        };

        if let Err(e) = self.runner.create_app(&params).await {
            ui.say_line(&format!("Error creating app: {e}"));
            return Err(ExitStatus::CommandFailed);
        }

        ui.say_line(&format!("Creating App: {name}"));
        let timeout = args.timeout.unwrap_or(self.timeout);
        let outcome = self.poll_while_tailing(ui, name, timeout).await;
        ui.say_new_line();
        match outcome {
            PollOutcome::Done => {
                ui.say_line(&colors::green(&format!("{name} is now running.")));
                for url in self.app_urls(&params) {
                    ui.say_line(&url);
                }
                Ok(())
            }
            PollOutcome::TimedOut => {
                ui.say_line(&colors::red(&format!("{name} took too long to start.")));
                Ok(())
            }
            PollOutcome::PlacementError => {
                ui.say_line(&colors::red(PLACEMENT_ERROR));
                Err(ExitStatus::PlacementError)
            }
            PollOutcome::Interrupted => Err(ExitStatus::SigInt),
        }
    }

    /// `submit-lrp PATH`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn submit_lrp(&self, ui: &mut dyn Ui, path: Option<&str>) -> Result<(), ExitStatus> {
        let Some(path) = path else {
            return Err(incorrect_usage(ui, "Path to JSON is required"));
        };
        let json = match tokio::fs::read(path).await {
            Ok(json) => json,
            Err(e) => {
                ui.say_line(&format!("Error reading file: {e}"));
                return Err(ExitStatus::FileSystemError);
            }
        };

        match self.runner.submit_lrp(&json).await {
            Ok(guid) => {
                ui.say_line(&format!("Successfully submitted {guid}."));
                ui.say_line(&format!("To view the status of your application: ltc status {guid}"));
                Ok(())
            }
            Err(e) => {
                ui.say_line(&format!("Error creating {}: {e}", e.guid));
                Err(ExitStatus::CommandFailed)
            }
        }
    }

    /// `scale APP_NAME NUMBER_OF_INSTANCES`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn scale(
        &self,
        ui: &mut dyn Ui,
        name: Option<&str>,
        instances: Option<&str>,
    ) -> Result<(), ExitStatus> {
        let (Some(name), Some(instances)) = (name, instances) else {
            return Err(incorrect_usage(
                ui,
                "Please enter 'ltc scale APP_NAME NUMBER_OF_INSTANCES'",
            ));
        };
        let Ok(instances) = instances.parse::<i32>() else {
            return Err(incorrect_usage(ui, "Number of Instances must be an integer"));
        };
        let Ok(wanted) = usize::try_from(instances) else {
            return Err(incorrect_usage(ui, "Number of Instances must be greater than 0"));
        };
        if wanted == 0 {
            return Err(incorrect_usage(ui, "Number of Instances must be greater than 0"));
        }

        if let Err(e) = self.runner.scale_app(name, instances).await {
            ui.say_line(&format!("Error Scaling App to {instances} instances: {e}"));
            return Err(ExitStatus::CommandFailed);
        }

        ui.say_line(&format!("Scaling {name} to {instances} instances"));
        let outcome = self
            .poll(ui, self.timeout, || self.check_instances(name, move |running| running == wanted))
            .await;
        ui.say_new_line();
        match outcome {
            PollOutcome::Done => {
                ui.say_line(&colors::green("App Scaled Successfully"));
                Ok(())
            }
            PollOutcome::TimedOut => {
                ui.say_line(&colors::red(&format!("{name} took too long to scale.")));
                Ok(())
            }
            PollOutcome::PlacementError => {
                ui.say_line(&colors::red(PLACEMENT_ERROR));
                Err(ExitStatus::PlacementError)
            }
            PollOutcome::Interrupted => Err(ExitStatus::SigInt),
        }
    }

    /// `update-routes APP_NAME NEW_ROUTES`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn update_routes(
        &self,
        ui: &mut dyn Ui,
        name: Option<&str>,
        routes: Option<&str>,
    ) -> Result<(), ExitStatus> {
        let (Some(name), Some(routes)) = (name, routes) else {
            return Err(incorrect_usage(
                ui,
                "Please enter 'ltc update-routes APP_NAME NEW_ROUTES'",
            ));
        };
        let routes = parse_route_overrides(routes).map_err(|e| incorrect_usage(ui, &e.to_string()))?;

        if let Err(e) = self.runner.update_app_routes(name, &routes).await {
            ui.say_line(&format!("Error updating routes: {e}"));
            return Err(ExitStatus::CommandFailed);
        }
        ui.say_line(&format!(
            "Updating {name} routes. You can check this app's current routes by running 'ltc status {name}'"
        ));
        Ok(())
    }

    /// `remove APP_NAME...`. Stops at the first app that cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn remove(&self, ui: &mut dyn Ui, names: &[String]) -> Result<(), ExitStatus> {
        if names.is_empty() {
            return Err(incorrect_usage(ui, "App Name required"));
        }
        for name in names {
            ui.say_line(&format!("Removing {name}..."));
            if let Err(e) = self.runner.remove_app(name).await {
                ui.say_line(&format!("Error stopping {name}: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        }
        Ok(())
    }

    /// Polls for the first running instance while the app's logs stream
    /// onto `ui`. The tail stops as soon as polling settles.
    async fn poll_while_tailing(&self, ui: &mut dyn Ui, name: &str, timeout: Duration) -> PollOutcome {
        let tail = TailedLogsOutputter::new(Arc::clone(&self.logs));
        let shared = Mutex::new(ui);
        let (outcome, ()) = tokio::join!(
            async {
                let mut ui = SharedUi::new(&shared);
                let outcome = self
                    .poll(&mut ui, timeout, || self.check_instances(name, |running| running >= 1))
                    .await;
                tail.stop_outputting();
                outcome
            },
            async {
                let mut ui = SharedUi::new(&shared);
                tail.output_tailed_logs(&mut ui, name).await;
            },
        );
        outcome
    }

    /// URLs the app answers on: one per route override, otherwise the bare
    /// app name followed by one per exposed port.
    fn app_urls(&self, params: &CreateAppParams) -> Vec<String> {
        let domain = self.runner.system_domain();
        if params.no_routes {
            return Vec::new();
        }
        if !params.route_overrides.is_empty() {
            return params
                .route_overrides
                .iter()
                .map(|route| format!("http://{}.{domain}", route.hostname_prefix))
                .collect();
        }
        std::iter::once(format!("http://{}.{domain}", params.name))
            .chain(
                params
                    .ports
                    .exposed
                    .iter()
                    .map(|port| format!("http://{}-{port}.{domain}", params.name)),
            )
            .collect()
    }

    async fn check_instances(&self, name: &str, ready: impl Fn(usize) -> bool) -> Check {
        match self.examiner.running_app_instances_info(name).await {
            Ok(info) if info.placement_error => Check::PlacementError,
            Ok(info) if ready(info.running) => Check::Done,
            Ok(_) => Check::Pending,
            Err(e) => {
                debug!(app = name, error = %e, "failed to count running instances");
                Check::Pending
            }
        }
    }

    /// Checks once per interval, printing a dot per failed check, until
    /// the check settles, `timeout` has elapsed or the process is
    /// interrupted. Time spent inside slow checks counts against `timeout`.
    async fn poll<G, Fut>(&self, ui: &mut dyn Ui, timeout: Duration, mut check: G) -> PollOutcome
    where
        G: FnMut() -> Fut,
        Fut: Future<Output = Check>,
    {
        let shutdown = self.exit_handler.shutdown_token();
        let deadline = self.clock.now() + timeout;
        loop {
            match check().await {
                Check::Done => return PollOutcome::Done,
                Check::PlacementError => return PollOutcome::PlacementError,
                Check::Pending => {}
            }
            if self.clock.now() >= deadline {
                return PollOutcome::TimedOut;
            }
            ui.dot();
            tokio::select! {
                () = shutdown.cancelled() => return PollOutcome::Interrupted,
                () = self.clock.sleep(POLL_INTERVAL) => {}
            }
        }
    }
}

fn incorrect_usage(ui: &mut dyn Ui, message: &str) -> ExitStatus {
    ui.say_incorrect_usage(message);
    ExitStatus::InvalidSyntax
}

/// `NAME=VALUE` sets a value; a bare `NAME` copies it from `lookup`,
/// empty when unset.
fn parse_env(vars: &[String], lookup: &EnvLookup) -> Vec<EnvironmentVariable> {
    vars.iter()
        .map(|var| match var.split_once('=') {
            Some((name, value)) => EnvironmentVariable::new(name, value),
            None => EnvironmentVariable::new(var.as_str(), lookup(var).unwrap_or_default()),
        })
        .collect()
}

/// Image variables first, each then overridden in place by a user
/// variable of the same name. New user variables follow in flag order.
/// Image entries without `=` are dropped.
fn merge_env(image_env: &[String], user_env: Vec<EnvironmentVariable>) -> Vec<EnvironmentVariable> {
    let mut env: Vec<EnvironmentVariable> = image_env
        .iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| EnvironmentVariable::new(name, value))
        .collect();
    for var in user_env {
        match env.iter_mut().find(|existing| existing.name == var.name) {
            Some(existing) => existing.value = var.value,
            None => env.push(var),
        }
    }
    env
}
