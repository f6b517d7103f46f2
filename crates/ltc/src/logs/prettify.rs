//! Column layout of component debug logs.

use std::fmt::Write as _;

use chrono::{DateTime, Local, TimeZone};

use super::chug::{Entry, LogEntry, LogLevel};
use crate::terminal::colors::{self, DEFAULT, GRAY, RED};
use crate::terminal::visible_width;

const SOURCE_WIDTH: usize = 22;
const LEVEL_WIDTH: usize = 9;
const TIMESTAMP_WIDTH: usize = 17;
const SESSION_WIDTH: usize = 14;

/// Column at which continuation lines (errors, data) start.
const CONTINUATION_INDENT: usize = 66;

fn source_color(source_type: &str) -> &'static str {
    match source_type.split(':').next().unwrap_or_default() {
        "rep" => colors::BLUE,
        "garden-linux" => colors::MAGENTA,
        _ => "",
    }
}

fn paint(code: &str, text: &str) -> String {
    if code.is_empty() {
        text.to_string()
    } else {
        colors::color_text(code, text)
    }
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(visible_width(text));
    format!("{text}{}", " ".repeat(fill))
}

fn format_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let centis = timestamp.timestamp_subsec_nanos() / 10_000_000;
    format!("{}.{centis:02}", timestamp.format("%m/%d %H:%M:%S"))
}

/// Renders `entry` as one or more terminal lines, without a trailing newline.
///
/// Structured records get level, timestamp and session columns; anything
/// else is shown raw behind the message timestamp.
#[must_use]
pub fn prettify(entry: &Entry) -> String {
    let message = &entry.log_message;
    let color = source_color(&message.source_type);
    let source = pad(
        &paint(
            color,
            &format!("[{}|{}]", message.source_type, message.source_instance),
        ),
        SOURCE_WIDTH,
    );

    match &entry.log {
        Some(log) => prettify_record(&source, color, log),
        None => {
            let timestamp = Local.timestamp_nanos(message.timestamp);
            [
                source,
                " ".repeat(LEVEL_WIDTH),
                pad(&format_timestamp(&timestamp), TIMESTAMP_WIDTH),
                " ".repeat(SESSION_WIDTH),
                message.text().into_owned(),
            ]
            .join(" ")
        }
    }
}

fn prettify_record(source: &str, color: &str, log: &LogEntry) -> String {
    let (label, level_color) = match log.log_level {
        LogLevel::Debug => ("[DEBUG]", GRAY),
        LogLevel::Info => ("[INFO]", color),
        LogLevel::Error => ("[ERROR]", RED),
        LogLevel::Fatal => ("[FATAL]", RED),
    };
    let timestamp = log.timestamp.with_timezone(&Local);

    let mut out = [
        source.to_string(),
        pad(&paint(level_color, label), LEVEL_WIDTH),
        pad(&format_timestamp(&timestamp), TIMESTAMP_WIDTH),
        pad(&log.session, SESSION_WIDTH),
        paint(level_color, &log.message),
    ]
    .join(" ");

    let indent = " ".repeat(CONTINUATION_INDENT);
    if let Some(error) = &log.error {
        let _ = write!(out, "\n{indent}{}", colors::red(error));
    }
    if !log.data.is_empty() {
        if let Ok(data) = serde_json::to_string(&log.data) {
            let _ = write!(out, "\n{indent}{data}");
        }
    }
    if !log.trace.is_empty() {
        let _ = write!(out, "\n{indent}{}", paint(level_color, &log.trace));
    }
    if !level_color.is_empty() {
        out.push_str(DEFAULT);
    }
    out
}
