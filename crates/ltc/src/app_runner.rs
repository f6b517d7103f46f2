//! Builds and submits desired LRPs.
//!
//! [`AppRunner`] turns user intent into receptor documents: it enforces the
//! reserved-name, existence and monitored-port rules, composes routes and
//! the health-check monitor, and issues the create, update and delete
//! calls. Polling until instances come up lives with the commands.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::docker::PortConfig;
use crate::error::{LATTICE_DEBUG_LOG_STREAM_APP_ID, LtcError, Result, SubmitError};
use crate::receptor::{
    Action, DesiredLrpCreateRequest, DesiredLrpUpdateRequest, DownloadAction, EnvironmentVariable,
    ReceptorClient, RunAction,
};
use crate::route_helpers::{self, AppRoutes, RouteOverride};

/// Freshness domain of every LRP the CLI creates.
pub const LRP_DOMAIN: &str = "lattice";

/// Where cells fetch the health-check binary from.
pub const HEALTHCHECK_DOWNLOAD_URL: &str =
    "http://file_server.service.dc1.consul:8080/v1/static/healthcheck.tgz";

const HEALTHCHECK_PATH: &str = "/tmp/healthcheck";
const APP_LOG_SOURCE: &str = "APP";
const HEALTH_LOG_SOURCE: &str = "HEALTH";

/// Everything needed to create an app.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAppParams {
    /// App name, used as process guid.
    pub name: String,
    /// Root filesystem URL.
    pub rootfs: String,
    /// Executable to run.
    pub start_command: String,
    /// Arguments of the executable.
    pub app_args: Vec<String>,
    /// Working directory of the process.
    pub working_dir: String,
    /// User environment, in the order given.
    pub env: Vec<EnvironmentVariable>,
    /// Run as root with escalated privileges.
    pub privileged: bool,
    /// Instance count.
    pub instances: i32,
    /// Relative CPU share, 1 to 100.
    pub cpu_weight: u32,
    /// Memory limit.
    pub memory_mb: i32,
    /// Disk limit.
    pub disk_mb: i32,
    /// Exposed ports and the monitored one.
    pub ports: PortConfig,
    /// Health-check the monitored port.
    pub monitor: bool,
    /// Explicit routes replacing the defaults.
    pub route_overrides: Vec<RouteOverride>,
    /// Register no routes at all.
    pub no_routes: bool,
    /// Free-form annotation.
    pub annotation: String,
}

impl Default for CreateAppParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            rootfs: String::new(),
            start_command: String::new(),
            app_args: Vec::new(),
            working_dir: String::new(),
            env: Vec::new(),
            privileged: false,
            instances: 1,
            cpu_weight: 100,
            memory_mb: 128,
            disk_mb: 1024,
            ports: PortConfig::default(),
            monitor: true,
            route_overrides: Vec::new(),
            no_routes: false,
            annotation: String::new(),
        }
    }
}

/// Creates, scales, re-routes and removes apps.
#[derive(Debug)]
pub struct AppRunner<R> {
    receptor: Arc<R>,
    system_domain: String,
}

const fn user_for(privileged: bool) -> &'static str {
    if privileged { "root" } else { "vcap" }
}

impl<R: ReceptorClient> AppRunner<R> {
    /// Creates a runner routing apps below `system_domain`.
    pub fn new(receptor: Arc<R>, system_domain: impl Into<String>) -> Self {
        Self {
            receptor,
            system_domain: system_domain.into(),
        }
    }

    /// The domain apps are routed below.
    #[must_use]
    pub fn system_domain(&self) -> &str {
        &self.system_domain
    }

    /// Creates the app described by `params`.
    ///
    /// # Errors
    ///
    /// Fails for the reserved debug guid, an existing app, a monitored
    /// port that is not exposed, and receptor errors.
    pub async fn create_app(&self, params: &CreateAppParams) -> Result<()> {
        if params.name == LATTICE_DEBUG_LOG_STREAM_APP_ID {
            return Err(LtcError::AttemptedToCreateLatticeDebug);
        }
        if self.desired_lrp_exists(&params.name).await? {
            return Err(LtcError::AppAlreadyExists(params.name.clone()));
        }
        if params.monitor && !params.ports.is_exposed(params.ports.monitored) {
            return Err(LtcError::MonitoredPortNotExposed);
        }

        self.receptor.upsert_domain(LRP_DOMAIN, Duration::ZERO).await?;

        let request = self.build_request(params);
        info!(app = %params.name, rootfs = %request.rootfs, "creating desired LRP");
        self.receptor.create_desired_lrp(&request).await?;
        Ok(())
    }

    /// Builds the desired LRP document for `params`.
    #[must_use]
    pub fn build_request(&self, params: &CreateAppParams) -> DesiredLrpCreateRequest {
        let primary_port = route_helpers::primary_port(params.ports.monitored, &params.ports.exposed);
        let user = user_for(params.privileged);

        let mut env = params.env.clone();
        env.push(EnvironmentVariable::new("PORT", primary_port.to_string()));

        let monitor = (params.monitor && primary_port != 0).then(|| {
            Action::Run(RunAction {
                path: HEALTHCHECK_PATH.to_string(),
                args: vec!["-port".to_string(), params.ports.monitored.to_string()],
                log_source: HEALTH_LOG_SOURCE.to_string(),
                user: user.to_string(),
                ..RunAction::default()
            })
        });

        DesiredLrpCreateRequest {
            process_guid: params.name.clone(),
            domain: LRP_DOMAIN.to_string(),
            rootfs: params.rootfs.clone(),
            instances: params.instances,
            env,
            setup: Some(Action::Download(DownloadAction {
                from: HEALTHCHECK_DOWNLOAD_URL.to_string(),
                to: "/tmp".to_string(),
                user: user.to_string(),
                ..DownloadAction::default()
            })),
            action: Some(Action::Run(RunAction {
                path: params.start_command.clone(),
                args: params.app_args.clone(),
                dir: params.working_dir.clone(),
                user: user.to_string(),
                ..RunAction::default()
            })),
            monitor,
            start_timeout: 0,
            disk_mb: params.disk_mb,
            memory_mb: params.memory_mb,
            cpu_weight: params.cpu_weight,
            privileged: params.privileged,
            ports: params.ports.exposed.clone(),
            routes: Some(self.build_routes(params, primary_port).routing_info()),
            log_guid: params.name.clone(),
            log_source: APP_LOG_SOURCE.to_string(),
            metrics_guid: params.name.clone(),
            annotation: params.annotation.clone(),
        }
    }

    fn build_routes(&self, params: &CreateAppParams, primary_port: u16) -> AppRoutes {
        if params.no_routes {
            AppRoutes::default()
        } else if params.route_overrides.is_empty() {
            route_helpers::default_routes(
                &params.name,
                &params.ports.exposed,
                primary_port,
                &self.system_domain,
            )
        } else {
            route_helpers::routes_from_overrides(&params.route_overrides, &self.system_domain)
        }
    }

    /// Submits a raw desired LRP document.
    ///
    /// Returns the process guid of the document.
    ///
    /// # Errors
    ///
    /// Fails for unparseable documents, the reserved debug guid, an
    /// existing app and receptor errors. The error carries the guid
    /// whenever the document parsed.
    pub async fn submit_lrp(&self, lrp_json: &[u8]) -> std::result::Result<String, SubmitError> {
        let request: DesiredLrpCreateRequest =
            serde_json::from_slice(lrp_json).map_err(|e| SubmitError::new("", e))?;
        let guid = request.process_guid.clone();

        if guid == LATTICE_DEBUG_LOG_STREAM_APP_ID {
            return Err(SubmitError::new(guid, LtcError::AttemptedToCreateLatticeDebug));
        }
        match self.desired_lrp_exists(&guid).await {
            Ok(false) => {}
            Ok(true) => return Err(SubmitError::new(guid.clone(), LtcError::AppAlreadyExists(guid))),
            Err(e) => return Err(SubmitError::new(guid, e)),
        }
        if let Err(e) = self.receptor.upsert_domain(LRP_DOMAIN, Duration::ZERO).await {
            return Err(SubmitError::new(guid, e));
        }
        if let Err(e) = self.receptor.create_desired_lrp(&request).await {
            return Err(SubmitError::new(guid, e));
        }
        Ok(guid)
    }

    /// Changes the instance count of an existing app.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::AppNotStarted`] if the app does not exist.
    pub async fn scale_app(&self, name: &str, instances: i32) -> Result<()> {
        self.ensure_started(name).await?;
        debug!(app = name, instances, "scaling");
        self.receptor
            .update_desired_lrp(
                name,
                &DesiredLrpUpdateRequest {
                    instances: Some(instances),
                    ..DesiredLrpUpdateRequest::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Replaces the routes of an existing app.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::AppNotStarted`] if the app does not exist.
    pub async fn update_app_routes(&self, name: &str, routes: &[RouteOverride]) -> Result<()> {
        self.ensure_started(name).await?;
        let routes = route_helpers::routes_from_overrides(routes, &self.system_domain);
        debug!(app = name, ?routes, "updating routes");
        self.receptor
            .update_desired_lrp(
                name,
                &DesiredLrpUpdateRequest {
                    routes: Some(routes.routing_info()),
                    ..DesiredLrpUpdateRequest::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Deletes an existing app.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::AppNotStarted`] if the app does not exist.
    pub async fn remove_app(&self, name: &str) -> Result<()> {
        self.ensure_started(name).await?;
        info!(app = name, "removing desired LRP");
        self.receptor.delete_desired_lrp(name).await?;
        Ok(())
    }

    async fn ensure_started(&self, name: &str) -> Result<()> {
        if self.desired_lrp_exists(name).await? {
            Ok(())
        } else {
            Err(LtcError::AppNotStarted(name.to_string()))
        }
    }

    async fn desired_lrp_exists(&self, name: &str) -> Result<bool> {
        let lrps = self.receptor.desired_lrps().await?;
        Ok(lrps.iter().any(|lrp| lrp.process_guid == name))
    }
}
