//! Merged views of desired and actual LRPs.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::{LtcError, Result};
use crate::logs::events::ContainerMetric;
use crate::receptor::{
    ActualLrpResponse, ActualLrpState, ApiErrorKind, DesiredLrpResponse, EnvironmentVariable,
    PortMapping, ReceptorClient,
};
use crate::route_helpers::AppRoutes;

/// Source of per-instance container metrics.
pub trait MetricsSource: Send + Sync {
    /// Latest metrics of every instance of `app_guid`.
    fn container_metrics(
        &self,
        app_guid: &str,
    ) -> impl Future<Output = Result<Vec<ContainerMetric>>> + Send;
}

/// Resource usage of one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstanceMetrics {
    /// CPU usage in percent.
    pub cpu_percentage: f64,
    /// Memory in bytes.
    pub memory_bytes: u64,
    /// Disk in bytes.
    pub disk_bytes: u64,
}

/// One actual instance of an app.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceInfo {
    /// Instance guid.
    pub instance_guid: String,
    /// Cell hosting the instance.
    pub cell_id: String,
    /// Instance index.
    pub index: i32,
    /// Cell address.
    pub ip: String,
    /// Host to container port mappings.
    pub ports: Vec<PortMapping>,
    /// Lifecycle state.
    pub state: ActualLrpState,
    /// Unix nanoseconds of the last state change.
    pub since: i64,
    /// Why the instance could not be placed.
    pub placement_error: String,
    /// Number of crashes.
    pub crash_count: i32,
    /// Resource usage, when the metrics stream reported it.
    pub metrics: Option<InstanceMetrics>,
}

impl From<&ActualLrpResponse> for InstanceInfo {
    fn from(lrp: &ActualLrpResponse) -> Self {
        Self {
            instance_guid: lrp.instance_guid.clone(),
            cell_id: lrp.cell_id.clone(),
            index: lrp.index,
            ip: lrp.address.clone(),
            ports: lrp.ports.clone(),
            state: lrp.state,
            since: lrp.since,
            placement_error: lrp.placement_error.clone(),
            crash_count: lrp.crash_count,
            metrics: None,
        }
    }
}

/// Desired and actual state of one app.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppInfo {
    /// App name.
    pub process_guid: String,
    /// Requested instance count.
    pub desired_instances: i32,
    /// Instances currently running.
    pub actual_running_instances: i32,
    /// Container environment.
    pub env: Vec<EnvironmentVariable>,
    /// Health-check grace period in seconds.
    pub start_timeout: u32,
    /// Disk limit.
    pub disk_mb: i32,
    /// Memory limit.
    pub memory_mb: i32,
    /// Relative CPU share.
    pub cpu_weight: u32,
    /// Exposed ports.
    pub ports: Vec<u16>,
    /// HTTP routes.
    pub routes: AppRoutes,
    /// Log stream guid.
    pub log_guid: String,
    /// Log source tag.
    pub log_source: String,
    /// Free-form annotation.
    pub annotation: String,
    /// Instances, ascending by index.
    pub actual_instances: Vec<InstanceInfo>,
}

impl From<&DesiredLrpResponse> for AppInfo {
    fn from(lrp: &DesiredLrpResponse) -> Self {
        Self {
            process_guid: lrp.process_guid.clone(),
            desired_instances: lrp.instances,
            actual_running_instances: 0,
            env: lrp.env.clone(),
            start_timeout: lrp.start_timeout,
            disk_mb: lrp.disk_mb,
            memory_mb: lrp.memory_mb,
            cpu_weight: lrp.cpu_weight,
            ports: lrp.ports.clone(),
            routes: AppRoutes::from_routing_info(lrp.routes.as_ref()),
            log_guid: lrp.log_guid.clone(),
            log_source: lrp.log_source.clone(),
            annotation: lrp.annotation.clone(),
            actual_instances: Vec::new(),
        }
    }
}

/// Load on one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellInfo {
    /// Cell id.
    pub cell_id: String,
    /// Running instances.
    pub running_instances: u32,
    /// Claimed instances.
    pub claimed_instances: u32,
    /// The cell hosts instances but did not report itself.
    pub missing: bool,
    /// Availability zone.
    pub zone: String,
    /// Memory capacity.
    pub memory_mb: i32,
    /// Disk capacity.
    pub disk_mb: i32,
    /// Container capacity.
    pub containers: i32,
}

/// Running instance count of an app, and whether any instance failed
/// placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningInstances {
    /// Instances in `RUNNING`.
    pub running: usize,
    /// Some instance reported a placement error.
    pub placement_error: bool,
}

/// Reads and merges cluster state.
#[derive(Debug)]
pub struct AppExaminer<R, M> {
    receptor: Arc<R>,
    metrics: M,
}

impl<R: ReceptorClient, M: MetricsSource> AppExaminer<R, M> {
    /// Creates an examiner.
    pub const fn new(receptor: Arc<R>, metrics: M) -> Self {
        Self { receptor, metrics }
    }

    /// All apps, by name.
    ///
    /// # Errors
    ///
    /// Fails if either listing fails.
    pub async fn list_apps(&self) -> Result<Vec<AppInfo>> {
        let desired = self.receptor.desired_lrps().await?;
        let actual = self.receptor.actual_lrps().await?;
        Ok(merge_desired_actual(&desired, &actual).into_values().collect())
    }

    /// All cells, by id, with their instance counts.
    ///
    /// # Errors
    ///
    /// Fails if either listing fails.
    pub async fn list_cells(&self) -> Result<Vec<CellInfo>> {
        let cells = self.receptor.cells().await?;
        let actual = self.receptor.actual_lrps().await?;
        Ok(aggregate_cells(&cells, &actual))
    }

    /// Detailed status of one app, with metrics when available.
    ///
    /// # Errors
    ///
    /// Fails with [`LtcError::AppNotFound`] if neither a desired LRP nor
    /// any instance exists, and on receptor errors other than a missing
    /// desired LRP.
    pub async fn app_status(&self, name: &str) -> Result<AppInfo> {
        let desired = match self.receptor.get_desired_lrp(name).await {
            Ok(lrp) => vec![lrp],
            Err(e) if e.is(ApiErrorKind::DesiredLrpNotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let actual = self.receptor.actual_lrps_by_process_guid(name).await?;

        let mut app = merge_desired_actual(&desired, &actual)
            .remove(name)
            .ok_or(LtcError::AppNotFound)?;

        match self.metrics.container_metrics(name).await {
            Ok(metrics) => attach_metrics(&mut app, &metrics),
            Err(e) => debug!(app = name, error = %e, "container metrics unavailable"),
        }
        Ok(app)
    }

    /// Whether any instance of `name` exists.
    ///
    /// # Errors
    ///
    /// Fails if the instances cannot be listed.
    pub async fn app_exists(&self, name: &str) -> Result<bool> {
        let actual = self.receptor.actual_lrps().await?;
        Ok(actual.iter().any(|lrp| lrp.process_guid == name))
    }

    /// Counts running instances of `name`.
    ///
    /// # Errors
    ///
    /// Fails if the instances cannot be listed.
    pub async fn running_app_instances_info(&self, name: &str) -> Result<RunningInstances> {
        let instances = self.receptor.actual_lrps_by_process_guid(name).await?;
        Ok(RunningInstances {
            running: instances
                .iter()
                .filter(|lrp| lrp.state == ActualLrpState::Running)
                .count(),
            placement_error: instances.iter().any(|lrp| !lrp.placement_error.is_empty()),
        })
    }
}

fn merge_desired_actual(
    desired: &[DesiredLrpResponse],
    actual: &[ActualLrpResponse],
) -> BTreeMap<String, AppInfo> {
    let mut apps: BTreeMap<String, AppInfo> = desired
        .iter()
        .map(|lrp| (lrp.process_guid.clone(), AppInfo::from(lrp)))
        .collect();

    for lrp in actual {
        let app = apps
            .entry(lrp.process_guid.clone())
            .or_insert_with(|| AppInfo {
                process_guid: lrp.process_guid.clone(),
                ..AppInfo::default()
            });
        if lrp.state == ActualLrpState::Running {
            app.actual_running_instances += 1;
        }
        app.actual_instances.push(InstanceInfo::from(lrp));
    }

    for app in apps.values_mut() {
        app.actual_instances.sort_by_key(|instance| instance.index);
    }
    apps
}

fn aggregate_cells(
    cells: &[crate::receptor::CellResponse],
    actual: &[ActualLrpResponse],
) -> Vec<CellInfo> {
    let mut all: BTreeMap<String, CellInfo> = cells
        .iter()
        .map(|cell| {
            (
                cell.cell_id.clone(),
                CellInfo {
                    cell_id: cell.cell_id.clone(),
                    zone: cell.zone.clone(),
                    memory_mb: cell.capacity.memory_mb,
                    disk_mb: cell.capacity.disk_mb,
                    containers: cell.capacity.containers,
                    ..CellInfo::default()
                },
            )
        })
        .collect();

    for lrp in actual.iter().filter(|lrp| lrp.state != ActualLrpState::Unclaimed) {
        let cell = all.entry(lrp.cell_id.clone()).or_insert_with(|| CellInfo {
            cell_id: lrp.cell_id.clone(),
            missing: true,
            ..CellInfo::default()
        });
        match lrp.state {
            ActualLrpState::Running => cell.running_instances += 1,
            ActualLrpState::Claimed => cell.claimed_instances += 1,
            _ => {}
        }
    }
    all.into_values().collect()
}

fn attach_metrics(app: &mut AppInfo, metrics: &[ContainerMetric]) {
    for metric in metrics {
        if let Some(instance) = app
            .actual_instances
            .iter_mut()
            .find(|instance| instance.index == metric.instance_index)
        {
            instance.metrics = Some(InstanceMetrics {
                cpu_percentage: metric.cpu_percentage,
                memory_bytes: metric.memory_bytes,
                disk_bytes: metric.disk_bytes,
            });
        }
    }
}
