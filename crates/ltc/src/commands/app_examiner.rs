//! `list`, `status`, `visualize` and `cells`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::app_examiner::{AppExaminer, AppInfo, CellInfo, InstanceInfo, MetricsSource};
use crate::error::{ExitStatus, LtcError};
use crate::exit_handler::ExitHandler;
use crate::graphical;
use crate::receptor::{ActualLrpState, ReceptorClient, TaskState};
use crate::refresh::{self, Clock};
use crate::task_examiner::{TaskExaminer, TaskInfo};
use crate::terminal::{Ui, align_columns, colors};

const APPS_HEADER: &str = "------------------------------= Apps =-------------------------------";
const TASKS_HEADER: &str = "------------------------------= Tasks =------------------------------";
const RULE_WIDTH: usize = 90;
const COLUMN_PADDING: usize = 4;
const DEFAULT_CHART_RATE: Duration = Duration::from_secs(1);
const INSTANCE_DOT: &str = "•";

/// Read-only views of the cluster.
pub struct AppExaminerCommand<R, M, C> {
    examiner: AppExaminer<R, M>,
    tasks: TaskExaminer<R>,
    clock: C,
    exit_handler: ExitHandler,
}

impl<R, M, C> fmt::Debug for AppExaminerCommand<R, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppExaminerCommand")
            .field("exit_handler", &self.exit_handler)
            .finish_non_exhaustive()
    }
}

impl<R, M, C> AppExaminerCommand<R, M, C>
where
    R: ReceptorClient,
    M: MetricsSource,
    C: Clock,
{
    /// Creates the commands. Live views tick on `clock` and stop when the
    /// exit handler shuts down.
    pub fn new(receptor: Arc<R>, metrics: M, clock: C, exit_handler: ExitHandler) -> Self {
        Self {
            examiner: AppExaminer::new(Arc::clone(&receptor), metrics),
            tasks: TaskExaminer::new(receptor),
            clock,
            exit_handler,
        }
    }

    /// `list`: every app, then every task.
    ///
    /// # Errors
    ///
    /// Returns [`ExitStatus::CommandFailed`] after reporting a listing error.
    pub async fn list(&self, ui: &mut dyn Ui) -> Result<(), ExitStatus> {
        let apps = match self.examiner.list_apps().await {
            Ok(apps) => apps,
            Err(e) => {
                ui.say_line(&format!("Error listing apps: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };
        ui.say_line(APPS_HEADER);
        if apps.is_empty() {
            ui.say_line("No apps to display.");
        } else {
            print_rows(ui, &apps_table(&apps));
        }

        let tasks = match self.tasks.list_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                ui.say_line(&format!("Error listing tasks: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };
        ui.say_new_line();
        ui.say_line(TASKS_HEADER);
        if tasks.is_empty() {
            ui.say_line("No tasks to display.");
        } else {
            print_rows(ui, &tasks_table(&tasks));
        }
        Ok(())
    }

    /// `status APP_NAME [--rate D] [--summary]`.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting the failure.
    pub async fn status(
        &self,
        ui: &mut dyn Ui,
        name: Option<&str>,
        rate: Option<Duration>,
        summary: bool,
    ) -> Result<(), ExitStatus> {
        let Some(name) = name else {
            ui.say_incorrect_usage("App Name required");
            return Err(ExitStatus::InvalidSyntax);
        };

        let app = match self.examiner.app_status(name).await {
            Ok(app) => app,
            Err(LtcError::AppNotFound) => {
                ui.say_line("App not found.");
                return Err(ExitStatus::CommandFailed);
            }
            Err(e) => {
                ui.say_line(&format!("Error getting status: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };

        match rate {
            None => {
                for line in status_lines(&app, summary) {
                    ui.say_line(&line);
                }
            }
            Some(rate) => {
                let close = self.exit_handler.shutdown_token();
                refresh::refresh(ui, &self.clock, &self.exit_handler, rate, &close, || {
                    self.status_frame(name, summary)
                })
                .await;
            }
        }
        Ok(())
    }

    async fn status_frame(&self, name: &str, summary: bool) -> Vec<String> {
        match self.examiner.app_status(name).await {
            Ok(app) => status_lines(&app, summary),
            Err(e) => vec![format!("Error getting status: {e}")],
        }
    }

    /// `visualize [--rate D] [--graphical]`: instances per cell.
    ///
    /// # Errors
    ///
    /// Returns [`ExitStatus::CommandFailed`] after reporting the failure.
    pub async fn visualize(
        &self,
        ui: &mut dyn Ui,
        rate: Option<Duration>,
        graphical: bool,
    ) -> Result<(), ExitStatus> {
        if graphical {
            let rate = rate.unwrap_or(DEFAULT_CHART_RATE);
            return graphical::print_distribution_chart(&self.examiner, &self.exit_handler, rate)
                .await
                .map_err(|e| {
                    ui.say_line(&format!("Error visualizing: {e}"));
                    ExitStatus::CommandFailed
                });
        }

        ui.say_line(&colors::bold("Distribution"));
        let cells = match self.examiner.list_cells().await {
            Ok(cells) => cells,
            Err(e) => {
                ui.say_line(&format!("Error visualizing: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };

        match rate {
            None => {
                for line in distribution_lines(&cells) {
                    ui.say_line(&line);
                }
            }
            Some(rate) => {
                let close = self.exit_handler.shutdown_token();
                refresh::refresh(ui, &self.clock, &self.exit_handler, rate, &close, || {
                    self.distribution_frame()
                })
                .await;
            }
        }
        Ok(())
    }

    async fn distribution_frame(&self) -> Vec<String> {
        match self.examiner.list_cells().await {
            Ok(cells) => distribution_lines(&cells),
            Err(e) => vec![format!("Error visualizing: {e}")],
        }
    }

    /// `cells`: capacity and load of every cell.
    ///
    /// # Errors
    ///
    /// Returns [`ExitStatus::CommandFailed`] after reporting the failure.
    pub async fn cells(&self, ui: &mut dyn Ui) -> Result<(), ExitStatus> {
        let cells = match self.examiner.list_cells().await {
            Ok(cells) => cells,
            Err(e) => {
                ui.say_line(&format!("Error listing cells: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        };

        let mut rows = vec![header(&["Cells", "Zone", "Memory", "Disk", "Apps"])];
        rows.extend(cells.iter().map(|cell| {
            vec![
                cell_label(cell),
                cell.zone.clone(),
                format!("{}M", cell.memory_mb),
                format!("{}M", cell.disk_mb),
                format!("{}/{}", cell.running_instances, cell.claimed_instances),
            ]
        }));
        print_rows(ui, &rows);
        Ok(())
    }
}

/// `running/desired`, green when they match, red when nothing runs,
/// yellow otherwise.
#[must_use]
pub fn colored_instances(running: i32, desired: i32) -> String {
    let text = format!("{running}/{desired}");
    if running == desired {
        colors::green(&text)
    } else if running == 0 {
        colors::red(&text)
    } else {
        colors::yellow(&text)
    }
}

fn header(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|title| colors::bold(title)).collect()
}

fn print_rows(ui: &mut dyn Ui, rows: &[Vec<String>]) {
    for line in align_columns(rows, COLUMN_PADDING) {
        ui.say_line(&line);
    }
}

fn apps_table(apps: &[AppInfo]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["App Name", "Instances", "DiskMB", "MemoryMB", "Route"])];
    rows.extend(apps.iter().map(|app| {
        vec![
            app.process_guid.clone(),
            colored_instances(app.actual_running_instances, app.desired_instances),
            app.disk_mb.to_string(),
            app.memory_mb.to_string(),
            app.routes.first_hostname().unwrap_or_default().to_string(),
        ]
    }));
    rows
}

fn tasks_table(tasks: &[TaskInfo]) -> Vec<Vec<String>> {
    let mut rows = vec![header(&["Task Name", "Cell ID", "Status", "Result", "Failure Reason"])];
    rows.extend(tasks.iter().map(|task| {
        vec![
            task.task_guid.clone(),
            task.cell_id.clone(),
            colored_task_state(task),
            task.result.clone(),
            task.failure_reason.clone(),
        ]
    }));
    rows
}

/// Task state colored by progress; failed tasks read `Failed` in red.
#[must_use]
pub fn colored_task_state(task: &TaskInfo) -> String {
    match task.state {
        TaskState::Pending | TaskState::Claimed | TaskState::Running => {
            colors::yellow(task.state.as_str())
        }
        TaskState::Completed | TaskState::Resolving if task.failed => colors::red("Failed"),
        TaskState::Completed | TaskState::Resolving => colors::green(task.state.as_str()),
        TaskState::Invalid => colors::red(task.state.as_str()),
    }
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn status_lines(app: &AppInfo, summary: bool) -> Vec<String> {
    let mut lines = vec![colors::bold(&app.process_guid), rule()];

    let mut rows = vec![
        vec![
            "Instances".to_string(),
            colored_instances(app.actual_running_instances, app.desired_instances),
        ],
        vec!["Start Timeout".to_string(), app.start_timeout.to_string()],
        vec!["DiskMB".to_string(), app.disk_mb.to_string()],
        vec!["MemoryMB".to_string(), app.memory_mb.to_string()],
        vec!["CPUWeight".to_string(), app.cpu_weight.to_string()],
        vec![
            "Ports".to_string(),
            app.ports
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ],
    ];
    push_labelled(
        &mut rows,
        "Routes",
        app.routes.0.iter().flat_map(|route| {
            route
                .hostnames
                .iter()
                .map(move |host| format!("{host} => {}", route.port))
        }),
    );
    if !app.annotation.is_empty() {
        rows.push(vec!["Annotation".to_string(), app.annotation.clone()]);
    }
    push_labelled(
        &mut rows,
        "Environment",
        app.env
            .iter()
            .map(|var| format!("{}=\"{}\"", var.name, var.value)),
    );
    lines.extend(align_columns(&rows, COLUMN_PADDING));
    lines.push(rule());

    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    if summary {
        let mut rows = vec![header(&["Instance", "State", "Crashes", "CPU", "Memory", "Uptime"])];
        rows.extend(app.actual_instances.iter().map(|instance| {
            vec![
                instance.index.to_string(),
                colored_state(instance),
                instance.crash_count.to_string(),
                instance
                    .metrics
                    .map_or_else(|| "N/A".to_string(), |m| format_cpu(m.cpu_percentage)),
                instance
                    .metrics
                    .map_or_else(|| "N/A".to_string(), |m| format_bytes(m.memory_bytes)),
                uptime(instance, now),
            ]
        }));
        lines.extend(align_columns(&rows, COLUMN_PADDING));
    } else {
        for instance in &app.actual_instances {
            lines.extend(instance_block(instance, now));
            lines.push(rule());
        }
    }
    lines
}

/// Labels the first value; later values go on unlabelled rows.
fn push_labelled(rows: &mut Vec<Vec<String>>, label: &str, values: impl Iterator<Item = String>) {
    let mut label = Some(label.to_string());
    for value in values {
        rows.push(vec![label.take().unwrap_or_default(), value]);
    }
    if let Some(label) = label {
        rows.push(vec![label, String::new()]);
    }
}

fn instance_block(instance: &InstanceInfo, now: i64) -> Vec<String> {
    let mut rows = vec![vec![
        colors::bold(&format!("Instance {}", instance.index)),
        colored_state(instance),
    ]];
    if instance.placement_error.is_empty() {
        let port_mapping = instance
            .ports
            .iter()
            .map(|p| format!("{}:{}", p.host_port, p.container_port))
            .collect::<Vec<_>>()
            .join(";");
        rows.extend([
            vec!["InstanceGuid".to_string(), instance.instance_guid.clone()],
            vec!["Cell ID".to_string(), instance.cell_id.clone()],
            vec!["Ip".to_string(), instance.ip.clone()],
            vec!["Port Mapping".to_string(), port_mapping],
            vec!["Uptime".to_string(), uptime(instance, now)],
        ]);
    } else {
        rows.push(vec!["Placement Error".to_string(), instance.placement_error.clone()]);
    }
    rows.push(vec!["Crash Count".to_string(), instance.crash_count.to_string()]);
    if let Some(metrics) = instance.metrics {
        rows.push(vec!["CPU".to_string(), format_cpu(metrics.cpu_percentage)]);
        rows.push(vec!["Memory".to_string(), format_bytes(metrics.memory_bytes)]);
    }
    align_columns(&rows, COLUMN_PADDING)
}

fn colored_state(instance: &InstanceInfo) -> String {
    let state = instance.state.as_str();
    match instance.state {
        ActualLrpState::Running => colors::green(state),
        ActualLrpState::Claimed => colors::yellow(state),
        ActualLrpState::Unclaimed if instance.placement_error.is_empty() => colors::cyan(state),
        ActualLrpState::Unclaimed | ActualLrpState::Invalid | ActualLrpState::Crashed => {
            colors::red(state)
        }
    }
}

fn format_cpu(percentage: f64) -> String {
    format!("{percentage:.2}%")
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!("{:.2}M", bytes as f64 / MIB)
}

fn uptime(instance: &InstanceInfo, now: i64) -> String {
    if instance.state != ActualLrpState::Running || instance.since == 0 {
        return "N/A".to_string();
    }
    let seconds = u64::try_from((now - instance.since) / 1_000_000_000).unwrap_or_default();
    format_duration(Duration::from_secs(seconds))
}

/// Formats whole seconds as `1h2m3s`, omitting leading zero units.
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn cell_label(cell: &CellInfo) -> String {
    if cell.missing {
        format!("{}{}", cell.cell_id, colors::red("[MISSING]"))
    } else {
        cell.cell_id.clone()
    }
}

fn distribution_lines(cells: &[CellInfo]) -> Vec<String> {
    cells
        .iter()
        .map(|cell| {
            if !cell.missing && cell.running_instances == 0 && cell.claimed_instances == 0 {
                return format!("{}: {}", cell.cell_id, colors::red("empty"));
            }
            let running = INSTANCE_DOT.repeat(cell.running_instances as usize);
            let claimed = INSTANCE_DOT.repeat(cell.claimed_instances as usize);
            format!(
                "{}: {}{}",
                cell_label(cell),
                colors::green(&running),
                colors::yellow(&claimed)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_examiner::fake::FakeMetrics;
    use crate::logs::events::ContainerMetric;
    use crate::receptor::fake::FakeReceptor;
    use crate::receptor::{
        ActualLrpResponse, CellCapacity, CellResponse, DesiredLrpResponse, EnvironmentVariable,
        PortMapping, ReceptorError, TaskResponse,
    };
    use crate::refresh::fake::FakeClock;
    use crate::route_helpers::{AppRoute, AppRoutes};
    use crate::terminal::cursor;
    use crate::terminal::testing::{buffer_ui, written};
    use test_case::test_case;

    type Command = AppExaminerCommand<FakeReceptor, FakeMetrics, FakeClock>;

    fn command(receptor: FakeReceptor, metrics: FakeMetrics, ticks: usize) -> Command {
        let exit_handler = ExitHandler::with_exiter(|_| {});
        let clock = FakeClock::new(ticks, exit_handler.shutdown_token());
        AppExaminerCommand::new(Arc::new(receptor), metrics, clock, exit_handler)
    }

    fn desired(name: &str, instances: i32) -> DesiredLrpResponse {
        DesiredLrpResponse {
            process_guid: name.into(),
            instances,
            disk_mb: 1024,
            memory_mb: 128,
            cpu_weight: 100,
            ports: vec![8080],
            routes: Some(
                AppRoutes(vec![AppRoute {
                    hostnames: vec![format!("{name}.lattice.dev")],
                    port: 8080,
                }])
                .routing_info(),
            ),
            env: vec![EnvironmentVariable::new("PORT", "8080")],
            ..DesiredLrpResponse::default()
        }
    }

    fn actual(name: &str, index: i32, cell: &str, state: ActualLrpState) -> ActualLrpResponse {
        ActualLrpResponse {
            process_guid: name.into(),
            instance_guid: format!("{name}-guid-{index}"),
            cell_id: cell.into(),
            index,
            address: "10.0.0.1".into(),
            ports: vec![PortMapping {
                container_port: 8080,
                host_port: 61000 + index as u16,
            }],
            state,
            ..ActualLrpResponse::default()
        }
    }

    fn cell(id: &str) -> CellResponse {
        CellResponse {
            cell_id: id.into(),
            zone: "z1".into(),
            capacity: CellCapacity {
                memory_mb: 4096,
                disk_mb: 8192,
                containers: 256,
            },
        }
    }

    #[test_case(2, 2, colors::GREEN ; "all running")]
    #[test_case(0, 0, colors::GREEN ; "nothing wanted")]
    #[test_case(0, 3, colors::RED ; "nothing running")]
    #[test_case(1, 3, colors::YELLOW ; "partially running")]
    fn instance_colors(running: i32, desired: i32, color: &str) {
        assert!(colored_instances(running, desired).starts_with(color));
    }

    #[tokio::test]
    async fn lists_apps_and_tasks() {
        let receptor = FakeReceptor::new()
            .with_desired(vec![desired("web", 2), desired("worker", 1)])
            .with_actual(vec![actual("web", 0, "cell-0", ActualLrpState::Running)])
            .with_tasks(vec![TaskResponse {
                task_guid: "task-1".into(),
                cell_id: "cell-0".into(),
                state: TaskState::Running,
                ..TaskResponse::default()
            }]);
        let mut ui = buffer_ui("");

        command(receptor, FakeMetrics::failing(), 0)
            .list(&mut ui)
            .await
            .expect("list");

        let out = written(&ui);
        assert!(out.starts_with(APPS_HEADER), "{out}");
        assert!(out.contains(&colors::bold("App Name")));
        assert!(out.contains(&colors::yellow("1/2")));
        assert!(out.contains(&colors::red("0/1")));
        assert!(out.contains("web.lattice.dev"));
        assert!(out.contains(TASKS_HEADER));
        assert!(out.contains(&colors::yellow("RUNNING")));
        assert!(out.contains("task-1"));
    }

    #[tokio::test]
    async fn list_without_apps_or_tasks() {
        let mut ui = buffer_ui("");
        command(FakeReceptor::new(), FakeMetrics::failing(), 0)
            .list(&mut ui)
            .await
            .expect("list");
        let out = written(&ui);
        assert!(out.contains("No apps to display."));
        assert!(out.contains("No tasks to display."));
    }

    #[tokio::test]
    async fn list_error_stops_early() {
        let receptor =
            FakeReceptor::new().fail("actual_lrps", ReceptorError::Transport("no route".into()));
        let mut ui = buffer_ui("");

        let status = command(receptor, FakeMetrics::failing(), 0)
            .list(&mut ui)
            .await
            .expect_err("error");

        assert_eq!(status, ExitStatus::CommandFailed);
        assert_eq!(written(&ui), "Error listing apps: no route\n");
    }

    #[tokio::test]
    async fn status_shows_app_and_instances() {
        let receptor = FakeReceptor::new()
            .with_desired(vec![DesiredLrpResponse {
                annotation: "owned by web team".into(),
                ..desired("web", 2)
            }])
            .with_actual(vec![
                actual("web", 0, "cell-0", ActualLrpState::Running),
                ActualLrpResponse {
                    placement_error: "insufficient resources".into(),
                    ..actual("web", 1, "", ActualLrpState::Unclaimed)
                },
            ]);
        let metrics = FakeMetrics::with(vec![ContainerMetric {
            application_id: "web".into(),
            instance_index: 0,
            cpu_percentage: 12.5,
            memory_bytes: 32 * 1024 * 1024,
            disk_bytes: 0,
        }]);
        let mut ui = buffer_ui("");

        command(receptor, metrics, 0)
            .status(&mut ui, Some("web"), None, false)
            .await
            .expect("status");

        let out = written(&ui);
        assert!(out.starts_with(&colors::bold("web")), "{out}");
        assert!(out.contains(&"-".repeat(RULE_WIDTH)));
        assert!(out.contains("web.lattice.dev => 8080"));
        assert!(out.contains("owned by web team"));
        assert!(out.contains("PORT=\"8080\""));
        assert!(out.contains("web-guid-0"));
        assert!(out.contains("61000:8080"));
        assert!(out.contains("12.50%"));
        assert!(out.contains("32.00M"));
        assert!(out.contains("insufficient resources"));
        assert!(out.contains(&colors::red("UNCLAIMED")));
        assert!(!out.contains("web-guid-1"));
    }

    #[tokio::test]
    async fn status_summary_marks_missing_metrics() {
        let receptor = FakeReceptor::new()
            .with_desired(vec![desired("web", 1)])
            .with_actual(vec![actual("web", 0, "cell-0", ActualLrpState::Claimed)]);
        let mut ui = buffer_ui("");

        command(receptor, FakeMetrics::failing(), 0)
            .status(&mut ui, Some("web"), None, true)
            .await
            .expect("status");

        let out = written(&ui);
        assert!(out.contains(&colors::bold("Crashes")));
        assert!(out.contains(&colors::yellow("CLAIMED")));
        assert!(out.contains("N/A"));
        assert!(!out.contains("InstanceGuid"));
    }

    #[tokio::test]
    async fn status_of_unknown_app() {
        let mut ui = buffer_ui("");
        let status = command(FakeReceptor::new(), FakeMetrics::failing(), 0)
            .status(&mut ui, Some("ghost"), None, false)
            .await
            .expect_err("missing");
        assert_eq!(status, ExitStatus::CommandFailed);
        assert_eq!(written(&ui), "App not found.\n");
    }

    #[tokio::test]
    async fn status_with_rate_redraws() {
        let receptor = FakeReceptor::new()
            .with_desired(vec![desired("web", 1)])
            .with_actual(vec![actual("web", 0, "cell-0", ActualLrpState::Running)]);
        let mut ui = buffer_ui("");

        command(receptor, FakeMetrics::failing(), 1)
            .status(&mut ui, Some("web"), Some(Duration::from_secs(1)), true)
            .await
            .expect("status");

        let out = written(&ui);
        assert!(out.starts_with(cursor::hide()));
        assert!(out.contains("\x1b["), "{out}");
        assert_eq!(out.matches(&colors::bold("web")).count(), 2, "{out}");
        assert!(out.ends_with(cursor::show()));
    }

    #[tokio::test]
    async fn visualizes_distribution() {
        let receptor = FakeReceptor::new()
            .with_cells(vec![cell("cell-0"), cell("cell-1")])
            .with_actual(vec![
                actual("web", 0, "cell-0", ActualLrpState::Running),
                actual("web", 1, "cell-0", ActualLrpState::Claimed),
                actual("web", 2, "cell-9", ActualLrpState::Running),
            ]);
        let mut ui = buffer_ui("");

        command(receptor, FakeMetrics::failing(), 0)
            .visualize(&mut ui, None, false)
            .await
            .expect("visualize");

        let expected = format!(
            "{}\ncell-0: {}{}\ncell-1: {}\ncell-9{}: {}\n",
            colors::bold("Distribution"),
            colors::green("•"),
            colors::yellow("•"),
            colors::red("empty"),
            colors::red("[MISSING]"),
            colors::green("•"),
        );
        assert_eq!(written(&ui), expected);
    }

    #[tokio::test]
    async fn visualize_error() {
        let receptor = FakeReceptor::new().fail("cells", ReceptorError::Transport("down".into()));
        let mut ui = buffer_ui("");
        let status = command(receptor, FakeMetrics::failing(), 0)
            .visualize(&mut ui, None, false)
            .await
            .expect_err("down");
        assert_eq!(status, ExitStatus::CommandFailed);
        assert!(written(&ui).ends_with("Error visualizing: down\n"));
    }

    #[tokio::test]
    async fn cells_table() {
        let receptor = FakeReceptor::new()
            .with_cells(vec![cell("cell-0")])
            .with_actual(vec![
                actual("web", 0, "cell-0", ActualLrpState::Running),
                actual("web", 1, "lost", ActualLrpState::Running),
            ]);
        let mut ui = buffer_ui("");

        command(receptor, FakeMetrics::failing(), 0)
            .cells(&mut ui)
            .await
            .expect("cells");

        let out = written(&ui);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(&colors::bold("Memory")));
        assert!(lines[1].starts_with("cell-0 "));
        assert!(lines[1].contains("4096M"));
        assert!(lines[1].ends_with("1/0"));
        assert!(lines[2].contains(&colors::red("[MISSING]")));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h2m5s");
    }

    #[test]
    fn failed_tasks_are_red() {
        let task = TaskInfo {
            failed: true,
            state: TaskState::Completed,
            ..TaskInfo::default()
        };
        assert_eq!(colored_task_state(&task), colors::red("Failed"));
        let task = TaskInfo {
            state: TaskState::Completed,
            ..TaskInfo::default()
        };
        assert_eq!(colored_task_state(&task), colors::green("COMPLETED"));
    }

    proptest::proptest! {
        #[test]
        fn instance_count_color_follows_running_and_wanted(running in 0i32..1000, wanted in 0i32..1000) {
            let colored = colored_instances(running, wanted);
            let color = if running == wanted {
                colors::GREEN
            } else if running == 0 {
                colors::RED
            } else {
                colors::YELLOW
            };
            proptest::prop_assert!(colored.starts_with(color), "{:?}", colored);
            let visible = &colored[color.len()..colored.len() - colors::DEFAULT.len()];
            proptest::prop_assert_eq!(visible, format!("{running}/{wanted}"));
        }

        #[test]
        fn partially_running_apps_are_yellow(wanted in 2i32..1000, offset in 1i32..1000) {
            let running = 1 + offset % (wanted - 1);
            proptest::prop_assert!(running > 0 && running < wanted);
            let colored = colored_instances(running, wanted);
            proptest::prop_assert!(colored.starts_with(colors::YELLOW), "{:?}", colored);
        }
    }
}
