//! `logs` and `debug-logs`.

use std::fmt;
use std::sync::Arc;

use crate::app_examiner::{AppExaminer, MetricsSource};
use crate::error::ExitStatus;
use crate::exit_handler::ExitHandler;
use crate::logs::{LogConsumer, TailedLogsOutputter};
use crate::receptor::ReceptorClient;
use crate::terminal::Ui;

/// Streams logs until the process is interrupted.
pub struct LogsCommand<R, M, L> {
    examiner: AppExaminer<R, M>,
    outputter: TailedLogsOutputter<L>,
    exit_handler: ExitHandler,
}

impl<R, M, L> fmt::Debug for LogsCommand<R, M, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogsCommand").finish_non_exhaustive()
    }
}

impl<R, M, L> LogsCommand<R, M, L>
where
    R: ReceptorClient,
    M: MetricsSource,
    L: LogConsumer,
{
    /// Creates the commands.
    pub fn new(receptor: Arc<R>, metrics: M, consumer: Arc<L>, exit_handler: ExitHandler) -> Self {
        Self {
            examiner: AppExaminer::new(receptor, metrics),
            outputter: TailedLogsOutputter::new(consumer),
            exit_handler,
        }
    }

    /// `logs APP_NAME`. Apps that do not exist yet are waited for.
    ///
    /// # Errors
    ///
    /// Returns the exit status after reporting a missing name or a failed
    /// lookup.
    pub async fn logs(&self, ui: &mut dyn Ui, name: Option<&str>) -> Result<(), ExitStatus> {
        let Some(name) = name else {
            ui.say_incorrect_usage("App Name required");
            return Err(ExitStatus::InvalidSyntax);
        };

        match self.examiner.app_exists(name).await {
            Ok(true) => {}
            Ok(false) => {
                ui.say_line(&format!("Application {name} not found."));
                ui.say_line(&format!("Tailing logs and waiting for {name} to appear..."));
            }
            Err(e) => {
                ui.say_line(&format!("Error getting status: {e}"));
                return Err(ExitStatus::CommandFailed);
            }
        }

        self.stop_on_exit();
        self.outputter.output_tailed_logs(ui, name).await;
        Ok(())
    }

    /// `debug-logs [--raw]`.
    pub async fn debug_logs(&self, ui: &mut dyn Ui, raw: bool) -> Result<(), ExitStatus> {
        self.stop_on_exit();
        self.outputter.output_debug_logs(ui, !raw).await;
        Ok(())
    }

    fn stop_on_exit(&self) {
        let stop = self.outputter.stop_handle();
        self.exit_handler.on_exit(move || stop.cancel());
    }
}
