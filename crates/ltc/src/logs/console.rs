//! Prints tailed logs to the terminal.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::chug::chug;
use super::events::LogMessage;
use super::prettify::prettify;
use super::reader::{LogConsumer, LogReader};
use crate::error::LATTICE_DEBUG_LOG_STREAM_APP_ID;
use crate::terminal::Ui;
use crate::terminal::colors;

/// Formats `message` as `HH:MM:SS [source|instance] text`.
#[must_use]
pub fn format_log_message(message: &LogMessage) -> String {
    let time = Local.timestamp_nanos(message.timestamp).format("%H:%M:%S");
    format!(
        "{} {} {}",
        colors::cyan(&time.to_string()),
        colors::yellow(&format!("[{}|{}]", message.source_type, message.source_instance)),
        message.text()
    )
}

/// Tails an app's logs onto a [`Ui`].
#[derive(Debug)]
pub struct TailedLogsOutputter<C> {
    reader: LogReader<C>,
}

impl<C: LogConsumer> TailedLogsOutputter<C> {
    /// Creates an outputter reading from `consumer`.
    pub fn new(consumer: Arc<C>) -> Self {
        Self {
            reader: LogReader::new(consumer),
        }
    }

    /// Prints the logs of `app_guid` until stopped.
    pub async fn output_tailed_logs(&self, ui: &mut dyn Ui, app_guid: &str) {
        self.output(ui, app_guid, |message| format_log_message(&message)).await;
    }

    /// Prints the debug logs of the cluster components until stopped.
    ///
    /// With `pretty`, structured component records are laid out in columns.
    pub async fn output_debug_logs(&self, ui: &mut dyn Ui, pretty: bool) {
        if pretty {
            self.output(ui, LATTICE_DEBUG_LOG_STREAM_APP_ID, |message| prettify(&chug(message)))
                .await;
        } else {
            self.output(ui, LATTICE_DEBUG_LOG_STREAM_APP_ID, |message| format_log_message(&message))
                .await;
        }
    }

    async fn output(&self, ui: &mut dyn Ui, app_guid: &str, format: impl Fn(LogMessage) -> String) {
        let ui = Mutex::new(ui);
        self.reader
            .tail_logs(
                app_guid,
                |message| ui.lock().say_line(&format(message)),
                |err| ui.lock().say_line(&err.to_string()),
            )
            .await;
    }

    /// Stops the current tail.
    pub fn stop_outputting(&self) {
        self.reader.stop_tailing();
    }

    /// Token that stops the tail when cancelled.
    #[must_use]
    pub fn stop_handle(&self) -> CancellationToken {
        self.reader.stop_handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::reader::fake::{FakeLogConsumer, log_message};
    use crate::terminal::testing::{buffer_ui, written};

    #[test]
    fn plain_format_tags_source() {
        let line = format_log_message(&log_message("APP", "1", "hello", 0));
        assert!(line.starts_with(colors::CYAN), "{line:?}");
        assert!(line.ends_with(&format!("{} hello", colors::yellow("[APP|1]"))), "{line:?}");
    }

    #[tokio::test]
    async fn prints_messages_and_errors() {
        let consumer = Arc::new(
            FakeLogConsumer::new(vec![
                log_message("APP", "0", "first", 0),
                log_message("HEALTH", "0", "second", 0),
            ])
            .with_errors(&["stream hiccup"])
            .closing(),
        );
        let outputter = TailedLogsOutputter::new(Arc::clone(&consumer));
        let mut ui = buffer_ui("");

        outputter.output_tailed_logs(&mut ui, "myapp").await;

        let out = written(&ui);
        assert!(out.starts_with("stream hiccup\n"), "{out:?}");
        let first = out.find("first").expect("first");
        let second = out.find("second").expect("second");
        assert!(first < second);
        assert_eq!(consumer.tailed(), vec!["myapp"]);
    }

    #[tokio::test]
    async fn debug_logs_tail_the_reserved_guid() {
        let consumer = Arc::new(
            FakeLogConsumer::new(vec![log_message(
                "rep",
                "cell-0",
                r#"{"timestamp":"1","source":"rep","message":"rep.tick","log_level":1,"data":{}}"#,
                0,
            )])
            .closing(),
        );
        let outputter = TailedLogsOutputter::new(Arc::clone(&consumer));
        let mut ui = buffer_ui("");

        outputter.output_debug_logs(&mut ui, true).await;

        assert_eq!(consumer.tailed(), vec![LATTICE_DEBUG_LOG_STREAM_APP_ID]);
        let out = written(&ui);
        assert!(out.contains("[INFO]"), "{out:?}");
        assert!(out.contains("rep.tick"));
    }

    #[tokio::test]
    async fn stopped_outputter_prints_nothing() {
        let consumer = Arc::new(FakeLogConsumer::new(vec![log_message("APP", "0", "late", 0)]));
        let outputter = TailedLogsOutputter::new(consumer);
        outputter.stop_outputting();

        let mut ui = buffer_ui("");
        outputter.output_tailed_logs(&mut ui, "myapp").await;
        assert!(written(&ui).is_empty());
    }
}
