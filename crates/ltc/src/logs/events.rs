//! Dropsonde event envelopes streamed by doppler.
//!
//! Only the fields the CLI reads are declared; prost skips the rest.

use prost::Message;

/// Kind of event carried by an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    /// HTTP start event.
    HttpStart = 2,
    /// HTTP stop event.
    HttpStop = 3,
    /// Combined HTTP start/stop event.
    HttpStartStop = 4,
    /// Application log line.
    LogMessage = 5,
    /// Component metric value.
    ValueMetric = 6,
    /// Component counter.
    CounterEvent = 7,
    /// Component error.
    Error = 8,
    /// Container resource usage.
    ContainerMetric = 9,
}

/// Stream a log line was written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    /// Standard output.
    Out = 1,
    /// Standard error.
    Err = 2,
}

/// Wrapper of every dropsonde event.
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    /// Component that emitted the event.
    #[prost(string, tag = "1")]
    pub origin: String,
    /// Which payload field is set.
    #[prost(enumeration = "EventType", tag = "2")]
    pub event_type: i32,
    /// Unix nanoseconds.
    #[prost(int64, tag = "6")]
    pub timestamp: i64,
    /// Set for [`EventType::LogMessage`].
    #[prost(message, optional, tag = "8")]
    pub log_message: Option<LogMessage>,
    /// Set for [`EventType::ContainerMetric`].
    #[prost(message, optional, tag = "12")]
    pub container_metric: Option<ContainerMetric>,
}

/// One log line of an app or component.
#[derive(Clone, PartialEq, Message)]
pub struct LogMessage {
    /// Raw line.
    #[prost(bytes = "vec", tag = "1")]
    pub message: Vec<u8>,
    /// Output stream.
    #[prost(enumeration = "MessageType", tag = "2")]
    pub message_type: i32,
    /// Unix nanoseconds.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    /// Log guid of the app.
    #[prost(string, tag = "4")]
    pub app_id: String,
    /// Emitter, e.g. `APP`, `HEALTH`, `rep`.
    #[prost(string, tag = "5")]
    pub source_type: String,
    /// Emitter instance, e.g. the instance index.
    #[prost(string, tag = "6")]
    pub source_instance: String,
}

impl LogMessage {
    /// The line as text; invalid UTF-8 is replaced.
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.message)
    }
}

/// Resource usage of one container.
#[derive(Clone, PartialEq, Message)]
pub struct ContainerMetric {
    /// App guid.
    #[prost(string, tag = "1")]
    pub application_id: String,
    /// Instance index.
    #[prost(int32, tag = "2")]
    pub instance_index: i32,
    /// CPU usage in percent.
    #[prost(double, tag = "3")]
    pub cpu_percentage: f64,
    /// Memory in bytes.
    #[prost(uint64, tag = "4")]
    pub memory_bytes: u64,
    /// Disk in bytes.
    #[prost(uint64, tag = "5")]
    pub disk_bytes: u64,
}

impl Envelope {
    /// Decodes one binary WebSocket frame.
    ///
    /// # Errors
    ///
    /// Fails if the frame is not a valid envelope.
    pub fn from_frame(frame: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(frame)
    }

    /// The log line carried by this envelope, if it is one.
    #[must_use]
    pub fn into_log_message(self) -> Option<LogMessage> {
        if self.event_type == EventType::LogMessage as i32 {
            self.log_message
        } else {
            None
        }
    }

    /// The container metric carried by this envelope, if it is one.
    #[must_use]
    pub fn into_container_metric(self) -> Option<ContainerMetric> {
        if self.event_type == EventType::ContainerMetric as i32 {
            self.container_metric
        } else {
            None
        }
    }
}
