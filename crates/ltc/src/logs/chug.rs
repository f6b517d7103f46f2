//! Best-effort parsing of structured component logs.
//!
//! Lattice components write JSON records such as
//! `{"timestamp":"1429296198.620077372","source":"rep","message":"rep.started","log_level":1,"data":{"session":"3"}}`,
//! sometimes behind a prefix. A record whose `session`, `trace` or
//! `error` fields are not strings is treated as plain text.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::events::LogMessage;

/// Severity of a structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operation.
    Info,
    /// Recoverable failure.
    Error,
    /// Unrecoverable failure.
    Fatal,
}

impl LogLevel {
    fn from_wire(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Debug),
            1 => Some(Self::Info),
            2 => Some(Self::Error),
            3 => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// A parsed structured record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub log_level: LogLevel,
    /// Emitting component.
    pub source: String,
    /// Record message.
    pub message: String,
    /// Session id, empty when absent.
    pub session: String,
    /// Error text of error and fatal records.
    pub error: Option<String>,
    /// Stack trace, empty when absent.
    pub trace: String,
    /// Remaining data fields.
    pub data: Map<String, Value>,
}

/// A log message, with its structured record when one was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The message as streamed.
    pub log_message: LogMessage,
    /// Parsed record.
    pub log: Option<LogEntry>,
}

#[derive(Deserialize)]
struct RawRecord {
    timestamp: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    message: String,
    log_level: u8,
    #[serde(default)]
    data: Map<String, Value>,
}

/// Looks for a structured record in `log_message`.
#[must_use]
pub fn chug(log_message: LogMessage) -> Entry {
    let log = parse_record(&log_message.text());
    Entry { log_message, log }
}

fn parse_record(raw: &str) -> Option<LogEntry> {
    let start = raw.find('{')?;
    let record = serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<RawRecord>()
        .next()?
        .ok()?;
    convert(record)
}

fn take_string(data: &mut Map<String, Value>, key: &str) -> Option<Option<String>> {
    match data.remove(key) {
        None => Some(None),
        Some(Value::String(s)) => Some(Some(s)),
        Some(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn convert(mut record: RawRecord) -> Option<LogEntry> {
    let seconds: f64 = record.timestamp.parse().ok()?;
    let log_level = LogLevel::from_wire(record.log_level)?;

    let error = if matches!(log_level, LogLevel::Error | LogLevel::Fatal) {
        take_string(&mut record.data, "error")?
    } else {
        None
    };
    let trace = take_string(&mut record.data, "trace")?.unwrap_or_default();
    let session = take_string(&mut record.data, "session")?.unwrap_or_default();

    let nanos = (seconds * 1e9) as i64;
    Some(LogEntry {
        timestamp: DateTime::from_timestamp_nanos(nanos),
        log_level,
        source: record.source,
        message: record.message,
        session,
        error,
        trace,
        data: record.data,
    })
}
